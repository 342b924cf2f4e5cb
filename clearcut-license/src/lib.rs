//! Licensing and activation for Clearcut.
//!
//! This crate decides, at startup, whether the current machine may run the
//! application, and performs the one-time activation when it may not yet:
//!
//! - Local cache store: the device's activation record as one JSON file,
//!   written with atomic-replace semantics
//! - Remote ledger client: the authoritative table of license keys, one row
//!   per key, reached over an authenticated JSON API
//! - Device identity: a stable namespaced hash of durable machine components
//! - License gate: the state machine tying the three together into a single
//!   PASS/FAIL verdict
//!
//! # Design Principles
//!
//! - **Single-seat binding**: a key is bound to exactly one device identity;
//!   once bound, its row is never overwritten
//! - **Closed failure taxonomy**: every failure is a [`LicenseError`]
//!   variant with structured fields; UI code formats the message
//! - **One run, one verdict**: the gate runs to completion before the host
//!   starts, and every invocation restarts from scratch

mod cache;
mod device;
mod error;
mod gate;
mod ledger;
mod record;

pub use cache::{LicenseCache, DEFAULT_CACHE_FILE};
pub use device::DeviceIdentity;
pub use error::{LicenseError, LicenseResult};
pub use gate::{run_detached, GatePhase, KeyPrompt, LicenseGate, Verdict};
pub use ledger::{
    HttpLedger, Ledger, LedgerConfig, LedgerRow, RowBinding, DEFAULT_CREDENTIALS_FILE,
};
pub use record::{activation_timestamp, LicenseRecord, TIMESTAMP_FORMAT};
