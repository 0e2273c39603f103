pub mod grid;
pub mod media_item;

pub use grid::*;
pub use media_item::*;
