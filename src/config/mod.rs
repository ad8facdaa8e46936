use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// Re-export existing config types
pub use crate::fetch::FetchConfig;
pub use crate::nats::NatsConfig;

/// Complete fleetcast configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Live update throttle thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Stationary drivers are admitted at most once per interval (seconds)
    #[serde(default = "default_min_interval")]
    pub min_interval_seconds: u64,
    /// Movement that is always admitted regardless of interval (meters)
    #[serde(default = "default_min_distance")]
    pub min_distance_meters: f64,
}

fn default_min_interval() -> u64 {
    15
}

fn default_min_distance() -> f64 {
    10.0
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_seconds: default_min_interval(),
            min_distance_meters: default_min_distance(),
        }
    }
}

/// How a well-formed event for a driver the store has never seen is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownEntityPolicy {
    /// Run a full resync so the new driver arrives with its metadata
    Resync,
    /// Insert the driver directly from the event payload
    Insert,
}

/// Connection supervision settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Fixed delay before a reconnect attempt (seconds)
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
    #[serde(default = "default_unknown_entity_policy")]
    pub unknown_entity_policy: UnknownEntityPolicy,
}

fn default_reconnect_delay() -> u64 {
    3
}

fn default_unknown_entity_policy() -> UnknownEntityPolicy {
    UnknownEntityPolicy::Resync
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_seconds: default_reconnect_delay(),
            unknown_entity_policy: default_unknown_entity_policy(),
        }
    }
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl FleetConfig {
    /// Apply environment overrides on top of file/default values.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("NATS_URL") {
            self.nats.url = url;
        }
        if let Ok(url) = std::env::var("FLEETCAST_FETCH_URL") {
            self.fetch.base_url = url;
        }
        if let Ok(key) = std::env::var("FLEETCAST_FETCH_API_KEY") {
            self.fetch.api_key = Some(key);
        }
        if let Ok(bind) = std::env::var("FLEETCAST_BIND") {
            self.api.bind = bind;
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<FleetConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path))?;
    let config: FleetConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path))?;

    info!(path = %path, "Loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = FleetConfig::default();
        assert_eq!(config.nats.subject, "fleet.locations");
        assert_eq!(config.throttle.min_interval_seconds, 15);
        assert_eq!(config.throttle.min_distance_meters, 10.0);
        assert_eq!(config.supervisor.reconnect_delay_seconds, 3);
        assert_eq!(config.supervisor.unknown_entity_policy, UnknownEntityPolicy::Resync);
        assert_eq!(config.fetch.activity_window_minutes, 10);
        assert_eq!(config.fetch.timestamp_column, "observed_at");
        assert!(config.fetch.primary_enabled);
        assert_eq!(config.api.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [nats]
            url = "nats://example.com:4222"
            subject = "dispatch.positions"

            [fetch]
            base_url = "https://data.example.com/rest/v1"
            primary_enabled = false
            activity_window_minutes = 30
            api_key = "secret"

            [throttle]
            min_interval_seconds = 5
            min_distance_meters = 25.0

            [supervisor]
            reconnect_delay_seconds = 1
            unknown_entity_policy = "insert"

            [api]
            bind = "127.0.0.1:9000"
        "#;

        let config: FleetConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.nats.url, "nats://example.com:4222");
        assert_eq!(config.nats.subject, "dispatch.positions");
        assert_eq!(config.fetch.base_url, "https://data.example.com/rest/v1");
        assert!(!config.fetch.primary_enabled);
        assert_eq!(config.fetch.activity_window_minutes, 30);
        assert_eq!(config.fetch.api_key.as_deref(), Some("secret"));
        // Unset fields inside a present section keep their defaults
        assert_eq!(config.fetch.positions_table, "driver_locations");
        assert_eq!(config.throttle.min_interval_seconds, 5);
        assert_eq!(config.throttle.min_distance_meters, 25.0);
        assert_eq!(config.supervisor.reconnect_delay_seconds, 1);
        assert_eq!(config.supervisor.unknown_entity_policy, UnknownEntityPolicy::Insert);
        assert_eq!(config.api.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [throttle]
            min_distance_meters = 50.0
        "#;

        let config: FleetConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.throttle.min_distance_meters, 50.0);
        assert_eq!(config.throttle.min_interval_seconds, 15); // Default
        assert_eq!(config.supervisor.reconnect_delay_seconds, 3); // Default
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[supervisor]\nreconnect_delay_seconds = 7").unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.supervisor.reconnect_delay_seconds, 7);
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/fleetcast.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let toml = r#"
            [supervisor]
            unknown_entity_policy = "ignore"
        "#;
        assert!(toml::from_str::<FleetConfig>(toml).is_err());
    }
}
