//! Alert sink: detection message + optional notification sound.

use crate::error::PlatformError;
use huewatch_core::{AlertSink, Detection};
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info, warn};

#[cfg(any(windows, target_os = "macos"))]
use std::fs::File;
#[cfg(any(windows, target_os = "macos"))]
use std::io::BufReader;

/// Logs the detection and plays a sound file, if one is configured and
/// present. Playback runs on a detached thread and its failures are
/// swallowed, so the watch loop is never affected.
pub struct SoundAlert {
    sound_path: Option<PathBuf>,
}

impl SoundAlert {
    pub fn new(sound_path: Option<PathBuf>) -> Self {
        Self { sound_path }
    }
}

impl AlertSink for SoundAlert {
    fn notify(&self, detection: &Detection) {
        info!("{}", detection.message());

        let Some(path) = self.sound_path.clone() else {
            return;
        };
        if !path.is_file() {
            debug!(?path, "sound file missing, skipping playback");
            return;
        }
        thread::spawn(move || {
            if let Err(e) = play_file(&path) {
                warn!(?path, error = %e, "sound playback failed");
            }
        });
    }
}

#[cfg(any(windows, target_os = "macos"))]
fn play_file(path: &Path) -> Result<(), PlatformError> {
    let (_stream, handle) =
        rodio::OutputStream::try_default().map_err(|e| PlatformError::Audio(e.to_string()))?;
    let sink = rodio::Sink::try_new(&handle).map_err(|e| PlatformError::Audio(e.to_string()))?;
    let file = File::open(path)?;
    let source =
        rodio::Decoder::new(BufReader::new(file)).map_err(|e| PlatformError::Audio(e.to_string()))?;
    sink.append(source);
    sink.sleep_until_end();
    Ok(())
}

#[cfg(not(any(windows, target_os = "macos")))]
fn play_file(_path: &Path) -> Result<(), PlatformError> {
    Err(PlatformError::Audio(
        "sound playback is not supported on this platform".into(),
    ))
}
