use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

// Re-export existing config types
pub use crate::connection::ConnectionConfig;

/// Complete CommandDeck configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeckConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Move indicator expiry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorConfig {
    /// Indicators older than this are removed (milliseconds)
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// How often the sweeper runs (milliseconds)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_ttl_ms() -> u64 {
    3000
}

fn default_sweep_interval_ms() -> u64 {
    1000
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl IndicatorConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Sweep period; a zero setting is raised to 1 ms
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

/// Renderer-facing HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// CORS origins; empty allows any
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_api_enabled() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8766))
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            listen_addr: default_listen_addr(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<DeckConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config: DeckConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DeckConfig::default();
        assert_eq!(config.connection.base_delay_ms, 2000);
        assert_eq!(config.connection.max_delay_ms, 30_000);
        assert_eq!(config.connection.growth_factor, 1.5);
        assert_eq!(config.indicators.ttl(), Duration::from_millis(3000));
        assert_eq!(config.indicators.sweep_interval(), Duration::from_secs(1));
        assert!(config.api.enabled);
        assert_eq!(config.api.listen_addr.port(), 8766);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [connection]
            url = "ws://deck.example.com:9000/ws"
            base_delay_ms = 500
            max_delay_ms = 10000
            growth_factor = 2.0
            event_buffer = 64

            [indicators]
            ttl_ms = 5000
            sweep_interval_ms = 250

            [api]
            enabled = false
            listen_addr = "0.0.0.0:9100"
            allowed_origins = ["http://localhost:5173"]
        "#;

        let config: DeckConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.connection.url, "ws://deck.example.com:9000/ws");
        assert_eq!(config.connection.base_delay_ms, 500);
        assert_eq!(config.connection.event_buffer, 64);
        assert_eq!(config.indicators.ttl_ms, 5000);
        assert_eq!(config.indicators.sweep_interval(), Duration::from_millis(250));
        assert!(!config.api.enabled);
        assert_eq!(config.api.listen_addr.port(), 9100);
        assert_eq!(config.api.allowed_origins, vec!["http://localhost:5173".to_string()]);
    }

    #[test]
    fn test_partial_config() {
        // Missing sections and fields use defaults
        let toml = r#"
            [connection]
            url = "ws://10.0.0.5:8765/ws"
        "#;

        let config: DeckConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.connection.url, "ws://10.0.0.5:8765/ws");
        assert_eq!(config.connection.base_delay_ms, 2000);
        assert_eq!(config.indicators.ttl_ms, 3000);
        assert!(config.api.enabled);
    }

    #[test]
    fn test_connection_backoff_from_config() {
        let toml = r#"
            [connection]
            base_delay_ms = 100
            max_delay_ms = 250
            growth_factor = 2.0
        "#;

        let config: DeckConfig = toml::from_str(toml).unwrap();
        let mut backoff = config.connection.backoff();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_sweep_interval_is_raised() {
        let config: DeckConfig = toml::from_str("[indicators]\nsweep_interval_ms = 0").unwrap();
        assert_eq!(config.indicators.sweep_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[indicators]\nttl_ms = 1200").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.indicators.ttl_ms, 1200);
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("absent.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nlisten_addr = \"not an address\"").unwrap();

        assert!(load_config(file.path()).is_err());
    }
}
