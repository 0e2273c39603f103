use std::path::{Path, PathBuf};

/// Pixel aspect ratio of a media item.
///
/// Either a confirmed positive width/height ratio or an explicit unknown
/// marker. Zero, negative and non-finite ratios are never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AspectRatio {
    Known(f64),
    Unknown,
}

impl AspectRatio {
    /// Ratio used for layout when nothing better is known.
    pub const ESTIMATE: f64 = 1.0;

    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::Unknown;
        }
        Self::from_ratio(width as f64 / height as f64)
    }

    pub fn from_ratio(ratio: f64) -> Self {
        if ratio.is_finite() && ratio > 0.0 {
            Self::Known(ratio)
        } else {
            Self::Unknown
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Self::Known(r) => *r,
            Self::Unknown => Self::ESTIMATE,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub path: PathBuf,
    pub name: String,
    pub aspect: AspectRatio,
}

impl MediaItem {
    pub fn new(path: PathBuf, name: impl Into<String>) -> Self {
        Self {
            path,
            name: name.into(),
            aspect: AspectRatio::Unknown,
        }
    }

    /// Create an item whose pixel dimensions are already known.
    pub fn with_dimensions(path: PathBuf, name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            aspect: AspectRatio::from_dimensions(width, height),
            ..Self::new(path, name)
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.aspect.value()
    }

    /// True while layout is working from the default unit ratio.
    pub fn is_estimated(&self) -> bool {
        !self.aspect.is_known()
    }

    /// Record confirmed pixel dimensions. Returns true if the ratio changed.
    pub fn set_dimensions(&mut self, width: u32, height: u32) -> bool {
        let aspect = AspectRatio::from_dimensions(width, height);
        if !aspect.is_known() || aspect == self.aspect {
            return false;
        }
        self.aspect = aspect;
        true
    }

    /// Follow an external rename. The old aspect ratio stays valid because
    /// the content is unchanged.
    pub fn rename(&mut self, path: &Path) {
        self.path = path.to_path_buf();
        self.name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
}
