//! Masonry thumbnail grid engine.
//!
//! Lays out the media files of a directory in variable-height columns,
//! scrolls a viewport over the result, and generates thumbnails for the
//! visible items with a bounded pool of external converter processes.

pub mod config;
pub mod error;
pub mod image_loader;
pub mod layout;
pub mod models;
pub mod scanner;
pub mod session;
pub mod thumbnails;

pub use config::GridConfig;
pub use error::GridError;
pub use layout::{compute_layout, Direction};
pub use models::{AspectRatio, Grid, ItemGeometry, MediaItem};
pub use session::{LogRenderer, PlacementRenderer, Region, Session, SessionBuilder};
