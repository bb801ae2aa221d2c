//! AppState construction extracted from `main.rs`.

use std::sync::Arc;

use anyhow::Context;

use hm_connector::create_connector;
use hm_domain::config::{Config, ConfigSeverity};

use crate::state::AppState;

/// Validate config, build the messaging connector and return a fully-wired
/// [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Messaging connector ──────────────────────────────────────────
    let connector =
        create_connector(&config.messaging).context("creating messaging connector")?;
    tracing::info!(
        backend = ?config.messaging.backend,
        version = ?config.messaging.version.map(|v| v.to_string()),
        client = %config.messaging.client.long_name,
        "messaging connector ready"
    );
    tracing::info!(
        concurrency = config.dispatch.concurrency,
        qr_size = config.qr.size,
        "dispatch settings"
    );

    Ok(AppState::new(config, connector))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_refused() {
        let Err(err) = build_app_state(Arc::new(Config::default())) else {
            panic!("expected validation failure");
        };
        assert!(err.to_string().contains("config validation failed"));
    }
}
