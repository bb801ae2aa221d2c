use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messaging connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Settings handed to the connector when a session opens its connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    #[serde(default)]
    pub backend: MessagingBackend,
    /// Base URL of the protocol bridge (`bridge` backend only).
    #[serde(default = "d_bridge_url")]
    pub bridge_url: String,
    /// Protocol client version announced during login.  Required.
    #[serde(default)]
    pub version: Option<ProtocolVersion>,
    /// Client identity announced during login.  Required.
    #[serde(default)]
    pub client: ClientIdentity,
    /// Domain appended to phone numbers to form recipient addresses.
    #[serde(default = "d_address_domain")]
    pub address_domain: String,
    /// How long session creation waits for the login code.
    #[serde(default = "d_20")]
    pub login_timeout_secs: u64,
    /// How long a login code stays valid before the handshake gives up.
    #[serde(default = "d_120")]
    pub scan_timeout_secs: u64,
    /// Per-request timeout against the bridge.
    #[serde(default = "d_10000")]
    pub request_timeout_ms: u64,
    /// Interval between login-status polls while waiting for the scan.
    #[serde(default = "d_1000")]
    pub poll_interval_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            backend: MessagingBackend::default(),
            bridge_url: d_bridge_url(),
            version: None,
            client: ClientIdentity::default(),
            address_domain: d_address_domain(),
            login_timeout_secs: 20,
            scan_timeout_secs: 120,
            request_timeout_ms: 10_000,
            poll_interval_ms: 1_000,
        }
    }
}

/// Which connection implementation sessions use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagingBackend {
    /// REST client for an external protocol bridge.
    #[default]
    Bridge,
    /// In-process dry run: nothing leaves the gateway.
    Loopback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Long client name shown on the paired device.
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub version: String,
}

impl ClientIdentity {
    pub fn is_complete(&self) -> bool {
        !self.long_name.is_empty() && !self.short_name.is_empty() && !self.version.is_empty()
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_bridge_url() -> String {
    "http://127.0.0.1:8085".into()
}
fn d_address_domain() -> String {
    "s.whatsapp.net".into()
}
fn d_20() -> u64 {
    20
}
fn d_120() -> u64 {
    120
}
fn d_10000() -> u64 {
    10_000
}
fn d_1000() -> u64 {
    1_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_required_fields_unset() {
        let cfg: MessagingConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.backend, MessagingBackend::Bridge);
        assert!(cfg.version.is_none());
        assert!(!cfg.client.is_complete());
        assert_eq!(cfg.address_domain, "s.whatsapp.net");
        assert_eq!(cfg.login_timeout_secs, 20);
    }

    #[test]
    fn parses_version_and_identity() {
        let toml_str = r#"
            backend = "loopback"

            [version]
            major = 2
            minor = 2142
            patch = 12

            [client]
            long_name = "Hermes Bulk Sender"
            short_name = "Hermes"
            version = "1.0"
        "#;
        let cfg: MessagingConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.backend, MessagingBackend::Loopback);
        assert_eq!(cfg.version.unwrap().to_string(), "2.2142.12");
        assert!(cfg.client.is_complete());
    }
}
