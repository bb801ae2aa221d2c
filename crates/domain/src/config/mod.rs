mod dispatch;
mod messaging;
mod observability;
mod server;

pub use dispatch::*;
pub use messaging::*;
pub use observability::*;
pub use server::*;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub qr: QrConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Overlay values from the environment on top of the parsed file.
    ///
    /// `lookup` is normally `|k| std::env::var(k).ok()`; tests pass a map.
    /// Recognized variables: `WHATSAPP_VERSION_{MAJOR,MINOR,PATCH}`,
    /// `CLIENT_{LONG,SHORT,VERSION}`, `QR_SIZE`, `CONCURRENCY`,
    /// `ALLOW_ORIGINS` (comma separated) and `PORT`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let major = parse_env::<u32, _>(&lookup, "WHATSAPP_VERSION_MAJOR")?;
        let minor = parse_env::<u32, _>(&lookup, "WHATSAPP_VERSION_MINOR")?;
        let patch = parse_env::<u32, _>(&lookup, "WHATSAPP_VERSION_PATCH")?;
        if major.is_some() || minor.is_some() || patch.is_some() {
            let base = self.version_parts();
            match (major.or(base.0), minor.or(base.1), patch.or(base.2)) {
                (Some(major), Some(minor), Some(patch)) => {
                    self.messaging.version = Some(ProtocolVersion { major, minor, patch });
                }
                _ => {
                    return Err(Error::Config(
                        "WHATSAPP_VERSION_MAJOR, WHATSAPP_VERSION_MINOR and \
                         WHATSAPP_VERSION_PATCH must be set together"
                            .into(),
                    ))
                }
            }
        }

        if let Some(v) = non_empty(&lookup, "CLIENT_LONG") {
            self.messaging.client.long_name = v;
        }
        if let Some(v) = non_empty(&lookup, "CLIENT_SHORT") {
            self.messaging.client.short_name = v;
        }
        if let Some(v) = non_empty(&lookup, "CLIENT_VERSION") {
            self.messaging.client.version = v;
        }
        if let Some(size) = parse_env(&lookup, "QR_SIZE")? {
            self.qr.size = size;
        }
        if let Some(concurrency) = parse_env(&lookup, "CONCURRENCY")? {
            self.dispatch.concurrency = concurrency;
        }
        if let Some(port) = parse_env(&lookup, "PORT")? {
            self.server.port = port;
        }
        if let Some(origins) = non_empty(&lookup, "ALLOW_ORIGINS") {
            self.server.cors.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_owned)
                .collect();
        }

        Ok(())
    }

    fn version_parts(&self) -> (Option<u32>, Option<u32>, Option<u32>) {
        match self.messaging.version {
            Some(v) => (Some(v.major), Some(v.minor), Some(v.patch)),
            None => (None, None, None),
        }
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Any issue with [`ConfigSeverity::Error`] must stop the gateway from
    /// starting.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();
        let mut error = |field: &str, message: &str| {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: field.into(),
                message: message.into(),
            })
        };

        if self.server.port == 0 {
            error("server.port", "port must be greater than 0");
        }
        if self.server.host.is_empty() {
            error("server.host", "host must not be empty");
        }
        if self.server.cors.allowed_origins.is_empty() {
            error("server.cors.allowed_origins", "origins allowed by CORS not set");
        }
        if self.messaging.version.is_none() {
            error("messaging.version", "protocol version (major, minor, patch) not set");
        }
        if !self.messaging.client.is_complete() {
            error(
                "messaging.client",
                "long_name, short_name and version must all be set",
            );
        }
        if self.messaging.address_domain.is_empty() {
            error("messaging.address_domain", "address domain must not be empty");
        }
        if self.messaging.login_timeout_secs == 0 {
            error("messaging.login_timeout_secs", "must be greater than 0");
        }
        if self.messaging.backend == MessagingBackend::Bridge
            && self.messaging.bridge_url.is_empty()
        {
            error("messaging.bridge_url", "bridge backend requires a base URL");
        }
        if self.qr.size == 0 {
            error("qr.size", "qr size not set");
        }
        if self.dispatch.concurrency == 0 {
            error("dispatch.concurrency", "peak concurrency must be a positive integer");
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }
        if self.messaging.backend == MessagingBackend::Loopback {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "messaging.backend".into(),
                message: "loopback backend: messages are logged, not delivered".into(),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn errors(cfg: &Config) -> Vec<String> {
        cfg.validate()
            .into_iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .map(|i| i.field)
            .collect()
    }

    #[test]
    fn default_config_reports_every_required_field() {
        let fields = errors(&Config::default());
        for expected in [
            "server.cors.allowed_origins",
            "messaging.version",
            "messaging.client",
            "qr.size",
            "dispatch.concurrency",
        ] {
            assert!(fields.iter().any(|f| f == expected), "missing {expected}");
        }
    }

    #[test]
    fn env_overrides_fill_required_fields() {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(env(&[
            ("WHATSAPP_VERSION_MAJOR", "2"),
            ("WHATSAPP_VERSION_MINOR", "2142"),
            ("WHATSAPP_VERSION_PATCH", "12"),
            ("CLIENT_LONG", "Hermes Bulk Sender"),
            ("CLIENT_SHORT", "Hermes"),
            ("CLIENT_VERSION", "1.0"),
            ("QR_SIZE", "256"),
            ("CONCURRENCY", "10"),
            ("ALLOW_ORIGINS", "https://a.example, https://b.example"),
            ("PORT", "8080"),
        ]))
        .unwrap();

        assert!(errors(&cfg).is_empty(), "{:?}", errors(&cfg));
        assert_eq!(cfg.messaging.version.unwrap().to_string(), "2.2142.12");
        assert_eq!(cfg.qr.size, 256);
        assert_eq!(cfg.dispatch.concurrency, 10);
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(
            cfg.server.cors.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn partial_version_override_merges_with_file() {
        let mut cfg = Config::default();
        cfg.messaging.version = Some(ProtocolVersion { major: 2, minor: 1, patch: 0 });
        cfg.apply_env_overrides(env(&[("WHATSAPP_VERSION_PATCH", "7")]))
            .unwrap();
        assert_eq!(cfg.messaging.version.unwrap().to_string(), "2.1.7");
    }

    #[test]
    fn partial_version_without_file_is_rejected() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides(env(&[("WHATSAPP_VERSION_MAJOR", "2")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn unparsable_number_is_a_config_error() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides(env(&[("CONCURRENCY", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("CONCURRENCY"));
    }

    #[test]
    fn wildcard_cors_is_only_a_warning() {
        let mut cfg = Config::default();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.field == "server.cors.allowed_origins"
            && i.severity == ConfigSeverity::Warning));
        assert!(!errors(&cfg).iter().any(|f| f == "server.cors.allowed_origins"));
    }
}
