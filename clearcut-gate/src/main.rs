//! Clearcut startup license gate.
//!
//! Console front-end for the license state machine: runs one validation to
//! completion and exits 0 on PASS, 1 on FAIL. The Clearcut desktop app
//! launches its UI only after this gate passes; this binary is also usable
//! standalone for support diagnostics.
//!
//! Usage:
//!   clearcut-gate --credentials service_account.json

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use clearcut_license::{
    run_detached, GatePhase, KeyPrompt, LicenseCache, LicenseError, LicenseGate, HttpLedger,
    LedgerConfig, Verdict, DEFAULT_CACHE_FILE, DEFAULT_CREDENTIALS_FILE,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "clearcut-gate")]
#[command(about = "Clearcut startup license gate")]
struct Args {
    /// Path to the local activation record
    #[arg(long, default_value = DEFAULT_CACHE_FILE)]
    cache: PathBuf,

    /// Path to the service-account credential file
    #[arg(long, default_value = DEFAULT_CREDENTIALS_FILE)]
    credentials: PathBuf,

    /// Base URL of the ledger API
    #[arg(long, default_value = "https://ledger.clearcutapp.com")]
    ledger_url: String,

    /// Ledger (table) holding this application's keys
    #[arg(long, default_value = "clearcut-licenses")]
    ledger_name: String,

    /// Installation label recorded at activation
    #[arg(long, default_value = "RGB")]
    label: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Reads a license key from the terminal.
struct ConsolePrompt;

#[async_trait]
impl KeyPrompt for ConsolePrompt {
    async fn request_key(&self) -> Option<String> {
        // Stdin is blocking; keep it off the runtime workers.
        tokio::task::spawn_blocking(|| {
            eprint!("Enter your license key: ");
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).ok()?;
            Some(line.trim().to_string())
        })
        .await
        .ok()
        .flatten()
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let cache = LicenseCache::new(args.cache);
    let ledger = HttpLedger::new(LedgerConfig {
        api_base_url: args.ledger_url,
        ledger_name: args.ledger_name,
        credentials_path: args.credentials,
        ..LedgerConfig::default()
    })?;
    let gate = LicenseGate::new(cache, ledger, ConsolePrompt, args.label);

    // The gate runs on its own task; this (UI-owning) task blocks on the
    // single verdict message before anything else happens.
    let verdict = run_detached(gate).await?;

    match verdict {
        Verdict::Verified => {
            info!("license verified; starting application");
            Ok(ExitCode::SUCCESS)
        }
        Verdict::Activated(record) => {
            println!("License activated on this device ({}).", record.timestamp);
            Ok(ExitCode::SUCCESS)
        }
        Verdict::Declined => {
            // User cancelled the prompt; exit without an error notice.
            Ok(ExitCode::FAILURE)
        }
        Verdict::Denied { phase, error } => {
            eprintln!("{}: {error}", headline(phase, &error));
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Maps a failure onto the notice title the desktop app shows.
fn headline(phase: GatePhase, error: &LicenseError) -> &'static str {
    if error.is_setup_error() {
        return "Credential error";
    }
    if matches!(error, LicenseError::Connection { .. }) {
        return "Connection failed";
    }
    match phase {
        GatePhase::Verification => "Validation failed",
        GatePhase::Activation => "Activation failed",
    }
}
