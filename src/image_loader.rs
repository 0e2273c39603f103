use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use image::ImageReader;

/// Read pixel dimensions from an image header without decoding pixels.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    let file = File::open(path).with_context(|| format!("Failed to open image: {:?}", path))?;
    let reader = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .context("Failed to guess image format")?;
    let (width, height) = reader
        .into_dimensions()
        .with_context(|| format!("Failed to read dimensions: {:?}", path))?;
    anyhow::ensure!(width > 0 && height > 0, "Image has no pixels: {:?}", path);
    Ok((width, height))
}
