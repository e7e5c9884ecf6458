//! Sampler stub: answers every sample with black. Useful for exercising
//! the watch loop on machines without capture support.

use huewatch_core::{CaptureError, Color, PixelGrid, Point, Region, ScreenSampler};
use tracing::debug;

pub struct StubSampler;

impl ScreenSampler for StubSampler {
    fn capture(&self, region: &Region) -> Result<PixelGrid, CaptureError> {
        debug!(?region, "stub capture");
        let (width, height) = crate::capture::check_region(region)?;
        Ok(PixelGrid::new(
            width,
            height,
            vec![Color::default(); (width * height) as usize],
        ))
    }

    fn sample_at(&self, point: Point) -> Result<Color, CaptureError> {
        debug!(?point, "stub sample");
        Ok(Color::default())
    }
}
