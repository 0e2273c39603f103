//! Runtime configuration for a grid session.
//!
//! Every knob has a module-level default; `GridConfig::default()` is what the
//! binary runs with.

use std::path::PathBuf;
use std::time::Duration;

/// Default number of concurrent converter processes.
pub const DEFAULT_WORKERS: usize = 4;

/// Upper bound for the worker pool.
pub const MAX_WORKERS: usize = 16;

/// Time a terminated converter gets before it is killed.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// Quiet period before a pending reflow runs.
pub const DEFAULT_REFLOW_DELAY: Duration = Duration::from_millis(1000);

const DEFAULT_MIN_CELL_WIDTH: usize = 20;
const DEFAULT_MAX_CELL_WIDTH: usize = 60;
const DEFAULT_TARGET_COLUMNS: usize = 3;
const DEFAULT_GAP: usize = 1;
const DEFAULT_MIN_IMAGE_ROWS: usize = 4;
const DEFAULT_MAX_IMAGE_ROWS: usize = 40;

/// Two border rows plus one label row.
const DEFAULT_LABEL_OVERHEAD: usize = 3;

/// Typical terminal cell: twice as tall as it is wide.
const DEFAULT_CELL_ASPECT: f64 = 0.5;

const DEFAULT_THUMB_BOX: (u32, u32) = (512, 512);
const DEFAULT_CONVERTER: &str = "magick";
const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif"];

/// Geometry parameters of the masonry layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub min_cell_width: usize,
    pub max_cell_width: usize,
    pub target_columns: usize,
    pub gap: usize,
    pub min_image_rows: usize,
    pub max_image_rows: usize,
    pub label_overhead: usize,
    /// Width over height of one display cell in pixels.
    pub cell_aspect: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_cell_width: DEFAULT_MIN_CELL_WIDTH,
            max_cell_width: DEFAULT_MAX_CELL_WIDTH,
            target_columns: DEFAULT_TARGET_COLUMNS,
            gap: DEFAULT_GAP,
            min_image_rows: DEFAULT_MIN_IMAGE_ROWS,
            max_image_rows: DEFAULT_MAX_IMAGE_ROWS,
            label_overhead: DEFAULT_LABEL_OVERHEAD,
            cell_aspect: DEFAULT_CELL_ASPECT,
        }
    }
}

/// Parameters of the thumbnail pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub max_workers: usize,
    pub kill_grace: Duration,
    pub converter: PathBuf,
    /// Bounding box of generated thumbnails in pixels.
    pub thumb_box: (u32, u32),
    /// Cache root; `None` uses the XDG cache directory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_WORKERS,
            kill_grace: DEFAULT_KILL_GRACE,
            converter: PathBuf::from(DEFAULT_CONVERTER),
            thumb_box: DEFAULT_THUMB_BOX,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub layout: LayoutConfig,
    pub pipeline: PipelineConfig,
    pub reflow_delay: Duration,
    /// Lowercase file extensions that are listed.
    pub extensions: Vec<String>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            pipeline: PipelineConfig::default(),
            reflow_delay: DEFAULT_REFLOW_DELAY,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl GridConfig {
    /// Worker count clamped to the supported range.
    pub fn workers(&self) -> usize {
        self.pipeline.max_workers.clamp(1, MAX_WORKERS)
    }
}
