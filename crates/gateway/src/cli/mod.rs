pub mod config;

use clap::{Parser, Subcommand};

use hm_domain::config::Config;

/// Hermes: bulk messaging through a paired device.
#[derive(Debug, Parser)]
#[command(name = "hermes", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults and environment
    /// overrides) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `HERMES_CONFIG` (or
/// `config.toml` by default) and apply environment overrides.  Returns the
/// resolved [`Config`] and the path that was used.
///
/// A missing file is not an error: every value can come from the
/// environment instead.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path =
        std::env::var("HERMES_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let mut config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    config
        .apply_env_overrides(|key| std::env::var(key).ok())
        .map_err(|e| anyhow::anyhow!("environment overrides: {e}"))?;

    Ok((config, config_path))
}
