//! The activation record persisted on this device.

use serde::{Deserialize, Serialize};

/// Format of the activation timestamp, as stored both locally and in the
/// ledger row. The value is an opaque equality token: verification compares
/// it byte-for-byte and never parses it back.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A device's activation record.
///
/// Written once at activation and re-read on every startup. Either the
/// cache file is absent or all four fields are present and non-empty;
/// partial records are treated as absent by the cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// The license key as entered by the user.
    pub key: String,
    /// Device identity bound at activation time.
    pub device_id: String,
    /// Caller-supplied application/installation identifier.
    pub label: String,
    /// Activation time, `YYYY-MM-DD HH:MM:SS` local time.
    pub timestamp: String,
}

impl LicenseRecord {
    /// Returns true if every field is present and non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.key.is_empty()
            && !self.device_id.is_empty()
            && !self.label.is_empty()
            && !self.timestamp.is_empty()
    }
}

/// Returns the current local time formatted for an activation record.
#[must_use]
pub fn activation_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
