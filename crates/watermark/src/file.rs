//! Watermark persistence.
//!
//! The watermark is stored as a single JSON object with fields `member_id`,
//! `committed` (RFC 3339), and `lsn`. Writes are truncate-and-rewrite, not
//! atomic rename: a crash between truncation and write can corrupt or lose
//! the persisted watermark. The relay treats that as a recoverable condition
//! and restarts from the origin, accepting redelivery of the full history.

use std::path::Path;

use thiserror::Error;
use tracing::warn;

use crate::Watermark;

/// Errors from watermark persistence.
#[derive(Error, Debug)]
pub enum StateError {
    /// The state file could not be read or written.
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The state file exists but does not hold a valid watermark.
    #[error("state file decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Serialize the watermark to `path`, truncating any previous contents.
pub fn save(path: impl AsRef<Path>, watermark: &Watermark) -> Result<(), StateError> {
    if let Some(dir) = path.as_ref().parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    std::fs::write(path, serde_json::to_string(watermark)?)?;
    Ok(())
}

/// Deserialize a watermark from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<Watermark, StateError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Load the watermark from `path`, falling back to [`Watermark::origin`]
/// when the file is missing or corrupt.
///
/// Falling back widens the resume window to the full history, which is safe
/// under at-least-once delivery; the failure is logged so an operator can
/// tell a cold start from a lost state file.
pub fn load_or_origin(path: impl AsRef<Path>) -> Watermark {
    match load(path.as_ref()) {
        Ok(watermark) => watermark,
        Err(e) => {
            warn!(
                path = %path.as_ref().display(),
                error = %e,
                "failed to load watermark state, starting from origin"
            );
            Watermark::origin()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample() -> Watermark {
        Watermark {
            member_id: 42,
            committed: Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap(),
            lsn: "0/1949850".to_string(),
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let original = sample();
        save(&path, &original).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, original);
    }

    #[test]
    fn json_uses_stable_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("member_id").is_some());
        assert!(json.get("committed").is_some());
        assert!(json.get("lsn").is_some());
    }

    #[test]
    fn save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("state.json");

        save(&path, &sample()).unwrap();
        assert_eq!(load(&path).unwrap(), sample());
    }

    #[test]
    fn save_truncates_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        std::fs::write(&path, "x".repeat(4096)).unwrap();
        save(&path, &sample()).unwrap();
        assert_eq!(load(&path).unwrap(), sample());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StateError::Io(_)));
    }

    #[test]
    fn load_corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{\"member_id\": tru").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, StateError::Decode(_)));
    }

    #[test]
    fn load_or_origin_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        assert_eq!(load_or_origin(&path), Watermark::origin());

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(load_or_origin(&path), Watermark::origin());

        save(&path, &sample()).unwrap();
        assert_eq!(load_or_origin(&path), sample());
    }
}
