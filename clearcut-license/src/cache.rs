//! Local cache store for the activation record.
//!
//! One JSON object on disk. Reads are forgiving (a missing or malformed
//! file is simply "no record"); writes are atomic via a temp file renamed
//! over the final path, so a crash leaves either the old complete record
//! or the new complete record, never a torn file.

use crate::error::{LicenseError, LicenseResult};
use crate::record::LicenseRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default cache filename, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = "license-rgb.json";

/// Owns the on-disk activation record.
///
/// Holds a read-through copy of the last successfully parsed record; the
/// copy is dropped after every successful [`write`](Self::write) so the
/// next read reflects the new file content.
#[derive(Debug)]
pub struct LicenseCache {
    path: PathBuf,
    cached: Option<LicenseRecord>,
}

impl LicenseCache {
    /// Creates a cache store over the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
        }
    }

    /// Creates a cache store at the default relative path.
    #[must_use]
    pub fn at_default_path() -> Self {
        Self::new(DEFAULT_CACHE_FILE)
    }

    /// Returns the cache file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the activation record, if one exists.
    ///
    /// Returns `None` when the file is absent, unreadable, malformed, or
    /// incomplete — never an error. Repeated calls return the memoized
    /// record without touching the filesystem.
    pub fn read(&mut self) -> Option<LicenseRecord> {
        if self.cached.is_none() {
            self.cached = self.read_from_disk();
        }
        self.cached.clone()
    }

    fn read_from_disk(&self) -> Option<LicenseRecord> {
        let bytes = fs::read(&self.path).ok()?;
        match serde_json::from_slice::<LicenseRecord>(&bytes) {
            Ok(record) if record.is_complete() => Some(record),
            Ok(_) => {
                warn!(path = %self.path.display(), "cache record incomplete, treating as absent");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache record unparseable, treating as absent");
                None
            }
        }
    }

    /// Atomically replaces the activation record.
    ///
    /// The record is serialized to `<path>.tmp` and renamed over the final
    /// path in one filesystem operation. On any failure before the rename
    /// the temp file is removed and the previous record stays untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::LocalWrite`] if serialization, the temp
    /// write, or the rename fails.
    pub fn write(&mut self, record: &LicenseRecord) -> LicenseResult<()> {
        let json = serde_json::to_string_pretty(record)?;

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            LicenseError::LocalWrite(format!("writing {}: {e}", tmp_path.display()))
        })?;

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            LicenseError::LocalWrite(format!("replacing {}: {e}", self.path.display()))
        })?;

        // Drop the memoized copy so the next read re-parses the new file.
        self.cached = None;
        debug!(path = %self.path.display(), "activation record written");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
