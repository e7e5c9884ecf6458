//! huewatch-core: domain model + watch loop.
//!
//! Design goal: keep this crate UI-agnostic and platform-agnostic.
//! Platform specific I/O (screen sampling, alert sound) lives in
//! `huewatch-platform`, injected through the `ScreenSampler` and
//! `AlertSink` traits.

mod color;
mod coords;
mod engine;
mod storage;

pub use color::{
    default_target_specs, matches_any, parse_color_list, Color, ColorSpec,
    DEFAULT_TARGET_PREFIXES,
};
pub use coords::{parse_points, parse_region, ParseError};
pub use engine::{
    AlertSink, CaptureError, Detection, PixelGrid, ScreenSampler, StartError, StopSignal,
    WatchCommand, WatchEvent, WatchState, Watcher,
};
pub use storage::{
    get_app_data_dir, load_colors, load_coords, save_colors, save_coords, StorageError,
    StorageResult,
};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Rectangular screen area: top-left corner + size, in screen
/// coordinates. The origin may be negative on multi-monitor setups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// What a session samples: one rectangle, or a list of discrete points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WatchTarget {
    Region(Region),
    Points(Vec<Point>),
}

/// Default poll interval for region watches.
pub const REGION_POLL_INTERVAL_MS: u64 = 1000;
/// Default poll interval for point-list watches.
pub const POINT_POLL_INTERVAL_MS: u64 = 5000;

/// Everything one watch session needs. Built once at start time and
/// immutable for the life of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub target: WatchTarget,
    pub colors: Vec<ColorSpec>,
    pub poll_interval: Duration,
}

impl WatchConfig {
    /// Region-mode config: the built-in prefix set merged with any
    /// user-supplied specs.
    pub fn for_region(region: Region, extra: &[ColorSpec]) -> Self {
        let mut colors = default_target_specs();
        colors.extend_from_slice(extra);
        Self {
            target: WatchTarget::Region(region),
            colors,
            poll_interval: Duration::from_millis(REGION_POLL_INTERVAL_MS),
        }
    }

    /// Point-mode config: a single configured target, usually exact.
    pub fn for_points(points: Vec<Point>, target: ColorSpec) -> Self {
        Self {
            target: WatchTarget::Points(points),
            colors: vec![target],
            poll_interval: Duration::from_millis(POINT_POLL_INTERVAL_MS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Build a region-mode config from raw user text. Empty coordinate
    /// text or a malformed region line is a validation error; the
    /// session never starts.
    pub fn region_from_text(coord_text: &str, color_text: &str) -> Result<Self, ParseError> {
        let region = parse_region(coord_text)?;
        debug!(
            x = region.x,
            y = region.y,
            width = region.width,
            height = region.height,
            "parsed watch region"
        );
        let extra = parse_color_list(color_text);
        for spec in &extra {
            info!(%spec, "user color added to target set");
        }
        Ok(Self::for_region(region, &extra))
    }

    /// Build a point-mode config from raw user text. Empty text is a
    /// validation error; individual bad lines are skipped by the parser.
    pub fn points_from_text(coord_text: &str, target: ColorSpec) -> Result<Self, ParseError> {
        if coord_text.trim().is_empty() {
            return Err(ParseError::EmptyInput);
        }
        Ok(Self::for_points(parse_points(coord_text), target))
    }
}
