//! huewatch-platform: platform-specific I/O boundary for huewatch.
//!
//! This crate provides:
//! - Screen sampling (region capture + single-pixel reads)
//! - The alert sink (notification sound + log message)
//! - One-shot snapshots of a region to an image file
//!
//! ## Module Structure
//!
//! - `error` - Common error types
//! - `capture` - Screen sampling (GDI on Windows, CoreGraphics on macOS)
//! - `stub` - Sampler stub for dry runs
//! - `alert` - Sound-playing alert sink
//! - `snapshot` - Region capture to image file

mod alert;
mod capture;
mod error;
mod snapshot;
mod stub;

pub use alert::SoundAlert;
pub use capture::native_sampler;
pub use error::{PlatformError, PlatformResult};
pub use snapshot::save_region;
pub use stub::StubSampler;
