pub mod masonry;
pub mod reflow;
pub mod viewport;

pub use masonry::MasonryLayout;
pub use reflow::ReflowScheduler;
pub use viewport::{Direction, ViewportState};

use crate::models::{Grid, MediaItem};

/// Lay out `items` with the default configuration.
pub fn compute_layout(items: &[MediaItem], viewport_width: usize, viewport_height: usize) -> Grid {
    MasonryLayout::default().compute(items, viewport_width, viewport_height)
}
