//! Remote ledger client.
//!
//! The ledger is the authoritative table of license keys: one row per key,
//! columns ordered (key, device_id, label, timestamp), rows starting at 1.
//! A row is bound iff its device column is non-empty.
//!
//! [`Ledger`] is the seam the state machine works against; [`HttpLedger`]
//! implements it over the hosted ledger's JSON API, authenticating with a
//! local service-account credential file.

use crate::error::{LicenseError, LicenseResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Default credential filename, relative to the working directory.
pub const DEFAULT_CREDENTIALS_FILE: &str = "service_account.json";

/// One row of the ledger, columns 1–4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// Column 1: the license key.
    pub key: String,
    /// Column 2: bound device identity, empty when unbound.
    pub device_id: String,
    /// Column 3: installation label.
    pub label: String,
    /// Column 4: activation timestamp.
    pub timestamp: String,
}

impl LedgerRow {
    /// Returns true if the row carries a device binding.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        !self.device_id.is_empty()
    }
}

/// Values written into columns 2–4 when a key is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBinding {
    /// Device identity taking the key.
    pub device_id: String,
    /// Installation label.
    pub label: String,
    /// Activation timestamp.
    pub timestamp: String,
}

/// Abstract ledger interface.
///
/// One instance serves one validation run; the connection is established
/// lazily and reused, never re-established once up.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Establishes (and memoizes) a session with the ledger.
    ///
    /// Already connected → immediate `Ok`. A missing credential file fails
    /// immediately with [`LicenseError::CredentialsNotFound`]; transient
    /// failures are retried up to a small fixed bound before
    /// [`LicenseError::Connection`] is reported.
    async fn connect(&self) -> LicenseResult<()>;

    /// Looks a key up in the ledger's key column.
    ///
    /// Returns the 1-based row index, or `None` if no row has this key.
    async fn find_row(&self, key: &str) -> LicenseResult<Option<u64>>;

    /// Fetches all four columns of a row in one round trip.
    async fn read_row(&self, index: u64) -> LicenseResult<LedgerRow>;

    /// Writes columns 2–4 of a row in one batched round trip.
    ///
    /// Durable once this returns `Ok`; no read-back verification is done.
    async fn bind_row(&self, index: u64, binding: &RowBinding) -> LicenseResult<()>;
}

/// Configuration for the hosted ledger API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the ledger API (e.g. `https://ledger.clearcutapp.com`).
    pub api_base_url: String,
    /// Name of the ledger (table) holding this application's keys.
    pub ledger_name: String,
    /// Path to the service-account credential file.
    pub credentials_path: PathBuf,
    /// How many connection attempts before giving up.
    pub connect_attempts: u32,
    /// Fixed delay between connection attempts.
    pub retry_delay_ms: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://ledger.clearcutapp.com".to_string(),
            ledger_name: "clearcut-licenses".to_string(),
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            connect_attempts: 2,
            retry_delay_ms: 1000,
            request_timeout_secs: 30,
        }
    }
}

/// Service-account credentials, loaded from a local JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServiceCredentials {
    client_email: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session: String,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    row: u64,
}

#[derive(Debug, Deserialize)]
struct RowResponse {
    values: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CellUpdate {
    column: u32,
    value: String,
}

/// Ledger client over the hosted JSON API.
pub struct HttpLedger {
    config: LedgerConfig,
    client: Client,
    session: Arc<RwLock<Option<String>>>,
}

impl HttpLedger {
    /// Creates a ledger client. No network traffic until
    /// [`connect`](Ledger::connect).
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Protocol`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: LedgerConfig) -> LicenseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LicenseError::Protocol(format!("building HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn load_credentials(&self) -> LicenseResult<ServiceCredentials> {
        let path = &self.config.credentials_path;
        if !path.exists() {
            return Err(LicenseError::CredentialsNotFound { path: path.clone() });
        }
        let bytes = std::fs::read(path)
            .map_err(|e| LicenseError::Protocol(format!("reading {}: {e}", path.display())))?;
        let creds = serde_json::from_slice(&bytes)?;
        Ok(creds)
    }

    /// One authentication round trip. Transient by definition; the caller
    /// owns the retry loop.
    async fn open_session(&self, creds: &ServiceCredentials) -> Result<String, String> {
        let response = self
            .client
            .post(format!("{}/api/v1/session", self.config.api_base_url))
            .json(&creds)
            .send()
            .await
            .map_err(|e| format!("session request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("session rejected ({status}): {body}"));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| format!("unparseable session response: {e}"))?;
        Ok(session.session)
    }

    async fn session(&self) -> LicenseResult<String> {
        self.session
            .read()
            .await
            .clone()
            .ok_or_else(|| LicenseError::Protocol("no ledger session established".to_string()))
    }

    fn rows_url(&self) -> String {
        format!(
            "{}/api/v1/ledgers/{}/rows",
            self.config.api_base_url, self.config.ledger_name
        )
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn connect(&self) -> LicenseResult<()> {
        if self.session.read().await.is_some() {
            return Ok(());
        }

        // Missing credentials are a setup error, not a transient one.
        let creds = self.load_credentials()?;

        let attempts = self.config.connect_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.open_session(&creds).await {
                Ok(session) => {
                    debug!(attempt, "ledger session established");
                    *self.session.write().await = Some(session);
                    return Ok(());
                }
                Err(detail) => {
                    warn!(attempt, %detail, "ledger connection attempt failed");
                    last_error = detail;
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms))
                            .await;
                    }
                }
            }
        }

        Err(LicenseError::Connection {
            attempts,
            detail: last_error,
        })
    }

    async fn find_row(&self, key: &str) -> LicenseResult<Option<u64>> {
        let session = self.session().await?;
        let response = self
            .client
            .get(self.rows_url())
            .bearer_auth(&session)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| LicenseError::Connection {
                attempts: 1,
                detail: format!("row lookup failed: {e}"),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(LicenseError::Protocol(format!(
                "row lookup rejected: {}",
                response.status()
            )));
        }

        let found: FindResponse = response
            .json()
            .await
            .map_err(|e| LicenseError::Protocol(format!("unparseable lookup response: {e}")))?;
        Ok(Some(found.row))
    }

    async fn read_row(&self, index: u64) -> LicenseResult<LedgerRow> {
        let session = self.session().await?;
        let response = self
            .client
            .get(format!("{}/{index}", self.rows_url()))
            .bearer_auth(&session)
            .send()
            .await
            .map_err(|e| LicenseError::Connection {
                attempts: 1,
                detail: format!("row fetch failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(LicenseError::Protocol(format!(
                "row fetch rejected: {}",
                response.status()
            )));
        }

        let row: RowResponse = response
            .json()
            .await
            .map_err(|e| LicenseError::Protocol(format!("unparseable row response: {e}")))?;

        // Trailing empty cells may be omitted by the server.
        let mut values = row.values;
        values.resize(4, String::new());
        let mut values = values.into_iter();
        Ok(LedgerRow {
            key: values.next().unwrap_or_default(),
            device_id: values.next().unwrap_or_default(),
            label: values.next().unwrap_or_default(),
            timestamp: values.next().unwrap_or_default(),
        })
    }

    async fn bind_row(&self, index: u64, binding: &RowBinding) -> LicenseResult<()> {
        let session = self.session().await?;
        let updates = vec![
            CellUpdate {
                column: 2,
                value: binding.device_id.clone(),
            },
            CellUpdate {
                column: 3,
                value: binding.label.clone(),
            },
            CellUpdate {
                column: 4,
                value: binding.timestamp.clone(),
            },
        ];

        let response = self
            .client
            .post(format!("{}/{index}/cells", self.rows_url()))
            .bearer_auth(&session)
            .json(&serde_json::json!({ "updates": updates }))
            .send()
            .await
            .map_err(|e| LicenseError::Connection {
                attempts: 1,
                detail: format!("row update failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(LicenseError::Protocol(format!(
                "row update rejected: {}",
                response.status()
            )));
        }

        debug!(row = index, "ledger row bound");
        Ok(())
    }
}
