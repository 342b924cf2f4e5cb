//! The license state machine.
//!
//! One validation run walks START → CHECKING_LOCAL → (VERIFYING_REMOTE |
//! PROMPTING_KEY → ACTIVATING) → PASS | FAIL, no state revisited. The gate
//! owns its collaborators for the duration of the run: the local cache, one
//! ledger connection, the key prompt, and the lazily derived device
//! identity. Every ledger failure is caught here and comes back as a
//! [`Verdict`]; nothing panics or propagates past this boundary.

use crate::cache::LicenseCache;
use crate::device::DeviceIdentity;
use crate::error::LicenseError;
use crate::ledger::{Ledger, RowBinding};
use crate::record::{activation_timestamp, LicenseRecord};
use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Which path of the state machine a failure happened on. UI copy differs
/// between verifying an existing license and activating a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    /// Cross-checking an existing local record against the ledger.
    Verification,
    /// First-time key prompt and binding.
    Activation,
}

/// Outcome of one validation run.
#[derive(Debug)]
pub enum Verdict {
    /// Existing record confirmed against the ledger.
    Verified,
    /// New activation completed; the freshly bound record is attached so
    /// the UI can acknowledge it.
    Activated(LicenseRecord),
    /// The user left the key prompt empty. Fails silently.
    Declined,
    /// Terminal failure; the UI formats a message from the error.
    Denied {
        /// Path the failure happened on.
        phase: GatePhase,
        /// What went wrong.
        error: LicenseError,
    },
}

impl Verdict {
    /// Returns true if the application may start.
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, Self::Verified | Self::Activated(_))
    }
}

/// The blocking text prompt for a license key.
///
/// Returning `None` or an empty string means the user declined.
#[async_trait]
pub trait KeyPrompt: Send + Sync {
    /// Asks the user for a license key.
    async fn request_key(&self) -> Option<String>;
}

/// The license gate. Runs to a [`Verdict`] before the host application is
/// allowed to start.
pub struct LicenseGate<L, P> {
    cache: LicenseCache,
    ledger: L,
    prompt: P,
    label: String,
    device: Option<DeviceIdentity>,
}

impl<L: Ledger, P: KeyPrompt> LicenseGate<L, P> {
    /// Creates a gate over the given collaborators. `label` identifies this
    /// application/installation in ledger rows (historically `"RGB"`).
    pub fn new(cache: LicenseCache, ledger: L, prompt: P, label: impl Into<String>) -> Self {
        Self {
            cache,
            ledger,
            prompt,
            label: label.into(),
            device: None,
        }
    }

    /// Runs one validation to completion.
    ///
    /// Never panics and never returns an error: every failure mode is a
    /// [`Verdict`] variant.
    pub async fn validate(&mut self) -> Verdict {
        debug!("checking local activation record");
        match self.cache.read() {
            Some(record) => match self.verify_existing(&record).await {
                Ok(()) => {
                    info!("license verified against ledger");
                    Verdict::Verified
                }
                Err(error) => Verdict::Denied {
                    phase: GatePhase::Verification,
                    error,
                },
            },
            None => match self.activate().await {
                Ok(Some(record)) => {
                    info!("license activated on this device");
                    Verdict::Activated(record)
                }
                Ok(None) => {
                    debug!("key prompt declined");
                    Verdict::Declined
                }
                Err(error) => Verdict::Denied {
                    phase: GatePhase::Activation,
                    error,
                },
            },
        }
    }

    /// VERIFYING_REMOTE: confirm the cached record still matches its row.
    async fn verify_existing(&mut self, record: &LicenseRecord) -> Result<(), LicenseError> {
        self.ledger.connect().await?;

        let index = self
            .ledger
            .find_row(&record.key)
            .await?
            .ok_or_else(|| LicenseError::KeyNotFound {
                key: record.key.clone(),
            })?;

        let row = self.ledger.read_row(index).await?;
        debug!(row = index, "comparing local record against ledger row");

        // Exact string equality on columns 2-4; report the first field
        // that disagrees.
        let fields = [
            ("device_id", &record.device_id, &row.device_id),
            ("label", &record.label, &row.label),
            ("timestamp", &record.timestamp, &row.timestamp),
        ];
        for (field, expected, found) in fields {
            if expected != found {
                return Err(LicenseError::RecordMismatch {
                    field,
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
        }
        Ok(())
    }

    /// PROMPTING_KEY → ACTIVATING: bind an unbound key to this device.
    ///
    /// `Ok(None)` means the prompt was declined. The remote row is bound
    /// before the local record is written; if the local write then fails,
    /// the error surfaces even though the remote side is already bound.
    async fn activate(&mut self) -> Result<Option<LicenseRecord>, LicenseError> {
        self.ledger.connect().await?;

        let key = match self.prompt.request_key().await {
            Some(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ => return Ok(None),
        };

        let index = self
            .ledger
            .find_row(&key)
            .await?
            .ok_or_else(|| LicenseError::KeyNotFound { key: key.clone() })?;

        let row = self.ledger.read_row(index).await?;
        if row.is_bound() {
            return Err(LicenseError::AlreadyBound { key });
        }

        let record = LicenseRecord {
            key,
            device_id: self.device_id().to_string(),
            label: self.label.clone(),
            timestamp: activation_timestamp(),
        };

        self.ledger
            .bind_row(
                index,
                &RowBinding {
                    device_id: record.device_id.clone(),
                    label: record.label.clone(),
                    timestamp: record.timestamp.clone(),
                },
            )
            .await?;

        if let Err(e) = self.cache.write(&record) {
            // The ledger row is bound at this point; the inconsistency is
            // accepted and reported, not rolled back.
            warn!(error = %e, "remote bind succeeded but local record could not be written");
            return Err(e);
        }

        Ok(Some(record))
    }

    /// Device identity, derived once per run.
    fn device_id(&mut self) -> &str {
        self.device.get_or_insert_with(DeviceIdentity::derive).id()
    }

    /// The ledger this gate talks to.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The key prompt this gate asks.
    pub fn prompt(&self) -> &P {
        &self.prompt
    }
}

/// Runs the gate on its own task and hands back a one-shot receiver for the
/// verdict. The caller (typically the UI thread) must not proceed until the
/// message arrives; exactly one message crosses this channel.
pub fn run_detached<L, P>(mut gate: LicenseGate<L, P>) -> oneshot::Receiver<Verdict>
where
    L: Ledger + 'static,
    P: KeyPrompt + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let verdict = gate.validate().await;
        let _ = tx.send(verdict);
    });
    rx
}
