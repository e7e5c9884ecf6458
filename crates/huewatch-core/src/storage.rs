//! Persisted watch configuration: two raw text blobs.
//!
//! The coordinate and color texts are stored verbatim, exactly as the
//! user entered them. There is no schema and no escaping; the line syntax
//! is the same one the parsers consume.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

const COORDS_FILE: &str = "coords.txt";
const COLORS_FILE: &str = "colors.txt";

/// Per-user app data directory for huewatch.
pub fn get_app_data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("huewatch")
}

/// Load the saved coordinate text, if any.
pub fn load_coords() -> Option<String> {
    load_text(&get_app_data_dir().join(COORDS_FILE))
}

/// Load the saved color text, if any.
pub fn load_colors() -> Option<String> {
    load_text(&get_app_data_dir().join(COLORS_FILE))
}

/// Persist the coordinate text.
pub fn save_coords(text: &str) -> StorageResult<PathBuf> {
    save_text(&get_app_data_dir(), COORDS_FILE, text)
}

/// Persist the color text.
pub fn save_colors(text: &str) -> StorageResult<PathBuf> {
    save_text(&get_app_data_dir(), COLORS_FILE, text)
}

fn load_text(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    debug!(?path, "loaded config text");
    Some(text)
}

fn save_text(dir: &Path, name: &str, text: &str) -> StorageResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    fs::write(&path, text)?;
    info!(?path, "saved config text");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let text = "100/200/50/60\n";
        let path = save_text(dir.path(), COORDS_FILE, text).unwrap();
        assert_eq!(load_text(&path).as_deref(), Some(text));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_text(&dir.path().join("absent.txt")).is_none());
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let path = save_text(&nested, COLORS_FILE, "#E1B").unwrap();
        assert!(path.exists());
    }
}
