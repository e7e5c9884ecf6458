//! One-shot region capture to an image file.

use crate::error::{PlatformError, PlatformResult};
use huewatch_core::{PixelGrid, Region, ScreenSampler};
use image::RgbImage;
use std::path::Path;
use tracing::info;

/// Capture `region` once and write it to `path`. The format follows the
/// file extension (bmp, png).
pub fn save_region(
    sampler: &dyn ScreenSampler,
    region: &Region,
    path: &Path,
) -> PlatformResult<()> {
    let grid = sampler
        .capture(region)
        .map_err(|e| PlatformError::Capture(e.to_string()))?;
    grid_to_image(&grid).save(path)?;
    info!(?path, "snapshot saved");
    Ok(())
}

fn grid_to_image(grid: &PixelGrid) -> RgbImage {
    RgbImage::from_fn(grid.width(), grid.height(), |x, y| {
        let color = grid.get(x, y).unwrap_or_default();
        image::Rgb([color.r, color.g, color.b])
    })
}
