use hm_domain::config::{Config, ConfigSeverity, MessagingBackend};

fn blocking(config: &Config) -> Vec<String> {
    config
        .validate()
        .into_iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .map(|i| i.to_string())
        .collect()
}

const COMPLETE: &str = r#"
[server]
host = "0.0.0.0"
port = 3210

[server.cors]
allowed_origins = ["https://send.example.com", "http://localhost:*"]

[messaging]
bridge_url = "http://bridge.internal:8085"

[messaging.version]
major = 2
minor = 2142
patch = 12

[messaging.client]
long_name = "Hermes Bulk Sender"
short_name = "Hermes"
version = "1.0"

[qr]
size = 300

[dispatch]
concurrency = 25
"#;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
}

#[test]
fn default_cors_is_empty_and_blocks_startup() {
    let config = Config::default();
    assert!(config.server.cors.allowed_origins.is_empty());
    assert!(blocking(&config)
        .iter()
        .any(|e| e.contains("server.cors.allowed_origins")));
}

#[test]
fn complete_file_validates_cleanly() {
    let config: Config = toml::from_str(COMPLETE).unwrap();
    assert!(blocking(&config).is_empty(), "{:?}", blocking(&config));
    assert_eq!(config.server.port, 3210);
    assert_eq!(config.qr.size, 300);
    assert_eq!(config.dispatch.concurrency, 25);
    assert_eq!(config.messaging.backend, MessagingBackend::Bridge);
    assert_eq!(config.messaging.bridge_url, "http://bridge.internal:8085");
}

#[test]
fn cors_wildcard_port_preserved_in_config() {
    let config: Config = toml::from_str(COMPLETE).unwrap();
    assert_eq!(config.server.cors.allowed_origins[1], "http://localhost:*");
}

#[test]
fn env_overrides_win_over_file_values() {
    let mut config: Config = toml::from_str(COMPLETE).unwrap();
    config
        .apply_env_overrides(|key| match key {
            "CONCURRENCY" => Some("3".into()),
            "ALLOW_ORIGINS" => Some("https://other.example".into()),
            "CLIENT_SHORT" => Some("H".into()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.dispatch.concurrency, 3);
    assert_eq!(config.server.cors.allowed_origins, vec!["https://other.example"]);
    assert_eq!(config.messaging.client.short_name, "H");
    assert_eq!(config.messaging.client.long_name, "Hermes Bulk Sender");
}

#[test]
fn zero_concurrency_is_rejected() {
    let mut config: Config = toml::from_str(COMPLETE).unwrap();
    config.dispatch.concurrency = 0;
    let errors = blocking(&config);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("[ERROR] dispatch.concurrency"));
}

#[test]
fn loopback_backend_warns() {
    let mut config: Config = toml::from_str(COMPLETE).unwrap();
    config.messaging.backend = MessagingBackend::Loopback;
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Warning && i.field == "messaging.backend"));
    assert!(blocking(&config).is_empty());
}
