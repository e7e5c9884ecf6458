//! macOS implementation of screen sampling, via CoreGraphics.

use super::{check_region, grid_from_bgra};
use core_graphics::geometry::{CGPoint, CGRect, CGSize};
use core_graphics::window::{
    create_image, kCGNullWindowID, kCGWindowImageDefault, kCGWindowImageNominalResolution,
    kCGWindowListOptionOnScreenOnly,
};
use huewatch_core::{CaptureError, Color, PixelGrid, Point, Region, ScreenSampler};

pub struct QuartzSampler;

impl ScreenSampler for QuartzSampler {
    fn capture(&self, region: &Region) -> Result<PixelGrid, CaptureError> {
        let (width, height) = check_region(region)?;
        capture_screen_rect(region.x, region.y, width, height)
    }

    fn sample_at(&self, point: Point) -> Result<Color, CaptureError> {
        let grid = capture_screen_rect(point.x, point.y, 1, 1)?;
        grid.get(0, 0).ok_or_else(|| {
            CaptureError(format!("pixel read failed at {}/{}", point.x, point.y))
        })
    }
}

fn capture_screen_rect(x: i32, y: i32, width: u32, height: u32) -> Result<PixelGrid, CaptureError> {
    let rect = CGRect::new(
        &CGPoint::new(x as f64, y as f64),
        &CGSize::new(width as f64, height as f64),
    );

    // Nominal resolution keeps the buffer in logical pixels on Retina
    // displays, so its size matches the requested rect.
    let image = create_image(
        rect,
        kCGWindowListOptionOnScreenOnly,
        kCGNullWindowID,
        kCGWindowImageDefault | kCGWindowImageNominalResolution,
    )
    .ok_or_else(|| {
        CaptureError(format!(
            "screen image failed for {}/{} {}x{}",
            x, y, width, height
        ))
    })?;

    let bytes_per_row = image.bytes_per_row() as u32;
    let data = image.data();
    let bytes = data.bytes();

    // The backing store may be rounded up; clamp to the requested size.
    let width = width.min(bytes_per_row / 4);
    let height = height.min(image.height() as u32);

    grid_from_bgra(bytes, width, height, bytes_per_row)
}
