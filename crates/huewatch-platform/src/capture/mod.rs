//! Screen sampling implementations.
//!
//! Platform implementations:
//! - Windows: GDI blit of the requested rectangle (`windows.rs`)
//! - macOS: CoreGraphics screen image (`macos.rs`)
//! - elsewhere: every sample fails with a capture error

use huewatch_core::{CaptureError, Color, PixelGrid, Point, Region, ScreenSampler};
use std::sync::Arc;

#[cfg(windows)]
mod windows;

#[cfg(target_os = "macos")]
mod macos;

/// Create the sampler appropriate for the current OS.
pub fn native_sampler() -> Arc<dyn ScreenSampler> {
    #[cfg(windows)]
    return Arc::new(windows::GdiSampler);

    #[cfg(target_os = "macos")]
    return Arc::new(macos::QuartzSampler);

    #[cfg(not(any(windows, target_os = "macos")))]
    Arc::new(UnsupportedSampler)
}

/// Validate a region before handing it to the OS. Capture of a
/// non-positive size can never succeed.
pub(crate) fn check_region(region: &Region) -> Result<(u32, u32), CaptureError> {
    if region.width <= 0 || region.height <= 0 {
        return Err(CaptureError(format!(
            "invalid capture size {}x{}",
            region.width, region.height
        )));
    }
    Ok((region.width as u32, region.height as u32))
}

/// Convert a BGRA byte buffer (top-down rows) into a grid of colors.
/// The alpha byte is dropped; sampled colors are always opaque.
pub(crate) fn grid_from_bgra(
    data: &[u8],
    width: u32,
    height: u32,
    bytes_per_row: u32,
) -> Result<PixelGrid, CaptureError> {
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let idx = (y * bytes_per_row + x * 4) as usize;
            let Some(bgra) = data.get(idx..idx + 4) else {
                return Err(CaptureError(
                    "capture buffer shorter than expected".into(),
                ));
            };
            pixels.push(Color::new(bgra[2], bgra[1], bgra[0]));
        }
    }
    Ok(PixelGrid::new(width, height, pixels))
}

#[cfg(not(any(windows, target_os = "macos")))]
struct UnsupportedSampler;

#[cfg(not(any(windows, target_os = "macos")))]
impl ScreenSampler for UnsupportedSampler {
    fn capture(&self, region: &Region) -> Result<PixelGrid, CaptureError> {
        check_region(region)?;
        Err(CaptureError(
            "screen capture is not supported on this platform".into(),
        ))
    }

    fn sample_at(&self, _point: Point) -> Result<Color, CaptureError> {
        Err(CaptureError(
            "screen capture is not supported on this platform".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_from_bgra_color_order() {
        // one pixel: B=1 G=2 R=3 A=255
        let grid = grid_from_bgra(&[1, 2, 3, 255], 1, 1, 4).unwrap();
        assert_eq!(grid.get(0, 0), Some(Color::new(3, 2, 1)));
    }

    #[test]
    fn test_grid_from_bgra_honors_stride() {
        // 1x2 rows padded to 8 bytes per row
        let data = [
            10, 20, 30, 255, 0, 0, 0, 0, // row 0
            40, 50, 60, 255, 0, 0, 0, 0, // row 1
        ];
        let grid = grid_from_bgra(&data, 1, 2, 8).unwrap();
        assert_eq!(grid.get(0, 0), Some(Color::new(30, 20, 10)));
        assert_eq!(grid.get(0, 1), Some(Color::new(60, 50, 40)));
    }

    #[test]
    fn test_grid_from_bgra_short_buffer_is_error() {
        assert!(grid_from_bgra(&[0, 0, 0], 1, 1, 4).is_err());
    }

    #[test]
    fn test_check_region_rejects_empty_sizes() {
        let bad = Region {
            x: 0,
            y: 0,
            width: 0,
            height: 10,
        };
        assert!(check_region(&bad).is_err());
        let good = Region {
            x: -5,
            y: -5,
            width: 10,
            height: 10,
        };
        assert_eq!(check_region(&good), Ok((10, 10)));
    }
}
