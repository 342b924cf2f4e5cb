//! Error types for the licensing module.

use std::path::PathBuf;
use thiserror::Error;

/// Licensing-specific errors.
///
/// This is a closed taxonomy: the gate never surfaces raw transport or I/O
/// errors to callers. UI code formats user-facing messages from these
/// variants and their fields rather than from exception text.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The service-account credential file is missing. A setup problem,
    /// never retried.
    #[error("credential file not found: {}", path.display())]
    CredentialsNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// Could not reach the ledger after the bounded retry sequence.
    #[error("could not reach the license ledger after {attempts} attempts: {detail}")]
    Connection {
        /// How many attempts were made before giving up.
        attempts: u32,
        /// Last underlying failure, for diagnostics.
        detail: String,
    },

    /// The license key has no row in the ledger.
    #[error("license key not recognized by the ledger")]
    KeyNotFound {
        /// The key that was looked up.
        key: String,
    },

    /// The key's ledger row already carries a device binding.
    #[error("license key is already bound to another device")]
    AlreadyBound {
        /// The key whose row is bound.
        key: String,
    },

    /// A field of the local record disagrees with the ledger row.
    #[error("local record does not match the ledger ({field}: expected {expected:?}, found {found:?})")]
    RecordMismatch {
        /// Which field differed first (`device_id`, `label` or `timestamp`).
        field: &'static str,
        /// Value held locally.
        expected: String,
        /// Value the ledger returned.
        found: String,
    },

    /// The activation record could not be persisted locally. The remote
    /// side may already be bound when this is returned.
    #[error("failed to persist activation record: {0}")]
    LocalWrite(String),

    /// The ledger answered with something the client cannot interpret.
    #[error("ledger protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Returns true if this error indicates missing local configuration
    /// rather than a runtime failure.
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        matches!(self, Self::CredentialsNotFound { .. })
    }

    /// Returns true if the failure points at the key itself (wrong, or
    /// consumed by another device) rather than at infrastructure.
    #[must_use]
    pub fn is_key_rejection(&self) -> bool {
        matches!(
            self,
            Self::KeyNotFound { .. } | Self::AlreadyBound { .. } | Self::RecordMismatch { .. }
        )
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
