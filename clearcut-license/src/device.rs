//! Device identity for license binding.
//!
//! Derives a stable pseudo-unique identifier for the current machine by
//! hashing durable machine components into a namespaced UUID (v5). The
//! derivation never fails: components that cannot be read are skipped, and
//! the OS/architecture components always exist.

use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

/// A stable identity for the current machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    id: String,
}

impl DeviceIdentity {
    /// Derives the identity for the current device.
    ///
    /// Deterministic on a given machine: repeated calls yield the same
    /// identifier as long as the underlying machine components (machine-id,
    /// hostname, user) do not change.
    #[must_use]
    pub fn derive() -> Self {
        let components = collect_machine_components();
        let combined = components.join("|");
        let id = Uuid::new_v5(&Uuid::NAMESPACE_DNS, combined.as_bytes()).to_string();
        Self { id }
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true if this identity matches the current device.
    #[must_use]
    pub fn matches_current(&self) -> bool {
        self.id == Self::derive().id
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Collects machine components for identity derivation.
///
/// OS and architecture are always present, so the result is never empty
/// even when every platform-specific source is unavailable.
fn collect_machine_components() -> Vec<String> {
    let mut components = Vec::new();

    components.push(env::consts::OS.to_string());
    components.push(env::consts::ARCH.to_string());

    // Machine ID (platform-specific, very stable)
    if let Some(machine_id) = get_machine_id() {
        components.push(machine_id);
    }

    // Hostname (can change but usually stable)
    if let Some(host) = get_hostname() {
        components.push(host);
    }

    // Username as a last differentiating component
    if let Ok(user) = env::var("USER").or_else(|_| env::var("USERNAME")) {
        components.push(user);
    }

    components
}

fn get_hostname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}

/// Gets the machine ID (platform-specific unique identifier).
fn get_machine_id() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "windows")]
    {
        // Registry MachineGuid would go here; hostname and user still
        // differentiate installs without it.
        None
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}
