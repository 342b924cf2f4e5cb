//! Shared test helpers for license tests.

#![allow(dead_code)]

use async_trait::async_trait;
use clearcut_license::{
    KeyPrompt, Ledger, LedgerRow, LicenseError, LicenseRecord, LicenseResult, RowBinding,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// In-memory ledger double. Rows are 1-based, like the remote store.
pub struct FakeLedger {
    rows: Mutex<Vec<LedgerRow>>,
    connect_error: Mutex<Option<LicenseError>>,
    pub connect_calls: AtomicU32,
}

impl FakeLedger {
    pub fn new(rows: Vec<LedgerRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            connect_error: Mutex::new(None),
            connect_calls: AtomicU32::new(0),
        }
    }

    /// A ledger whose first `connect` fails with the given error.
    pub fn failing_connect(rows: Vec<LedgerRow>, error: LicenseError) -> Self {
        let ledger = Self::new(rows);
        *ledger.connect_error.lock().unwrap() = Some(error);
        ledger
    }

    /// Snapshot of a row (1-based), panicking on a bad index.
    pub fn row(&self, index: u64) -> LedgerRow {
        self.rows.lock().unwrap()[index as usize - 1].clone()
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn connect(&self) -> LicenseResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        match self.connect_error.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn find_row(&self, key: &str) -> LicenseResult<Option<u64>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().position(|r| r.key == key).map(|i| i as u64 + 1))
    }

    async fn read_row(&self, index: u64) -> LicenseResult<LedgerRow> {
        let rows = self.rows.lock().unwrap();
        rows.get(index as usize - 1)
            .cloned()
            .ok_or_else(|| LicenseError::Protocol(format!("no row at index {index}")))
    }

    async fn bind_row(&self, index: u64, binding: &RowBinding) -> LicenseResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(index as usize - 1)
            .ok_or_else(|| LicenseError::Protocol(format!("no row at index {index}")))?;
        if row.is_bound() {
            return Err(LicenseError::Protocol("row already bound".to_string()));
        }
        row.device_id = binding.device_id.clone();
        row.label = binding.label.clone();
        row.timestamp = binding.timestamp.clone();
        Ok(())
    }
}

/// Prompt double that answers with a fixed key (or declines).
pub struct ScriptedPrompt {
    answer: Option<String>,
    pub asked: AtomicBool,
}

impl ScriptedPrompt {
    pub fn answering(key: &str) -> Self {
        Self {
            answer: Some(key.to_string()),
            asked: AtomicBool::new(false),
        }
    }

    pub fn declining() -> Self {
        Self {
            answer: None,
            asked: AtomicBool::new(false),
        }
    }

    pub fn was_asked(&self) -> bool {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyPrompt for ScriptedPrompt {
    async fn request_key(&self) -> Option<String> {
        self.asked.store(true, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// A complete record as it would exist after activation.
pub fn sample_record() -> LicenseRecord {
    LicenseRecord {
        key: "CC-4821-XKQP".to_string(),
        device_id: "2f1a9f6e-8c7d-5e4b-9a1c-0d3e5f7a9b1c".to_string(),
        label: "RGB".to_string(),
        timestamp: "2026-03-14 09:26:53".to_string(),
    }
}

/// The ledger row matching [`sample_record`].
pub fn bound_row() -> LedgerRow {
    let r = sample_record();
    LedgerRow {
        key: r.key,
        device_id: r.device_id,
        label: r.label,
        timestamp: r.timestamp,
    }
}

/// An unbound row for the given key.
pub fn unbound_row(key: &str) -> LedgerRow {
    LedgerRow {
        key: key.to_string(),
        device_id: String::new(),
        label: String::new(),
        timestamp: String::new(),
    }
}
