//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: where the ingestion hub listens, how much history it keeps.
//!     - ClientConfig: endpoint ladder, retry/timeout, refresh interval bounds.
//!     - LoggingConfig: default log filter and whether readings are echoed.
//!     - ClusterConfig: which role(s) this process runs.
//!
//! every section and field is optional; missing ones take the defaults below.
//!
//! ==============================================================================

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use tracing::info;

use crate::acquire::RetryPolicy;
use crate::history::DEFAULT_CAPACITY;
use crate::supervisor::RefreshSettings;

/// explicit config path, checked before the default locations
pub const CONFIG_ENV: &str = "FARM_HOST_CONFIG";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub history_capacity: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// tried in order
    pub endpoints: Vec<String>,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub refresh_interval_seconds: u64,
    pub min_refresh_interval_seconds: u64,
    pub max_refresh_interval_seconds: u64,
    pub auto_refresh: bool,
    pub history_capacity: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// used when RUST_LOG is unset
    pub level: String,
    pub show_sensor_data: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// ingestion server only
    Hub,
    /// acquisition client only
    Monitor,
    /// both in one process
    #[default]
    Standalone,
}

impl Role {
    pub fn runs_hub(self) -> bool {
        matches!(self, Role::Hub | Role::Standalone)
    }

    pub fn runs_monitor(self) -> bool {
        matches!(self, Role::Monitor | Role::Standalone)
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub role: Role,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            history_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "http://192.168.4.1/api/sensor-data".to_string(),
                "http://192.168.1.100/api/sensor-data".to_string(),
                "http://localhost:3000/api/current-data".to_string(),
            ],
            timeout_ms: 2000,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            refresh_interval_seconds: 10,
            min_refresh_interval_seconds: 5,
            max_refresh_interval_seconds: 60,
            auto_refresh: true,
            history_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

/// where the loaded configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// nothing usable found; `problems` lists files that failed to load
    Defaults { problems: Vec<String> },
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .with_context(|| format!("invalid bind address `{}`", self.bind))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl ClientConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            endpoints: self.endpoints.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            attempts: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings::new(
            Duration::from_secs(self.refresh_interval_seconds),
            Duration::from_secs(self.min_refresh_interval_seconds),
            Duration::from_secs(self.max_refresh_interval_seconds),
            self.auto_refresh,
        )
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow!("Failed to parse config: {}", e))
    }

    /// Load with default fallback
    ///
    /// tries `$FARM_HOST_CONFIG`, then `config/host.toml`, then `../config/host.toml`.
    pub fn load_or_default() -> (Self, ConfigOrigin) {
        let mut paths = Vec::new();
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            paths.push(PathBuf::from(explicit));
        }
        paths.push(PathBuf::from("config").join("host.toml"));
        paths.push(PathBuf::from("..").join("config").join("host.toml"));

        let mut problems = Vec::new();
        for path in paths {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(config) => return (config, ConfigOrigin::File(path)),
                Err(e) => problems.push(format!("{}: {}", path.display(), e)),
            }
        }

        (Self::default(), ConfigOrigin::Defaults { problems })
    }

    /// reject settings the host cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cluster.role.runs_monitor() {
            let client = &self.client;
            if client.endpoints.is_empty() {
                bail!("client.endpoints must list at least one endpoint");
            }
            if client.retry_attempts == 0 {
                bail!("client.retry_attempts must be at least 1");
            }
            if client.timeout_ms == 0 {
                bail!("client.timeout_ms must be positive");
            }
            if client.min_refresh_interval_seconds > client.max_refresh_interval_seconds {
                bail!(
                    "client refresh bounds inverted: min {}s > max {}s",
                    client.min_refresh_interval_seconds,
                    client.max_refresh_interval_seconds
                );
            }
        }
        if self.cluster.role.runs_hub() {
            self.server.socket_addr()?;
        }
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        info!("role: {:?}", self.cluster.role);
        if self.cluster.role.runs_hub() {
            info!(
                "hub: {}:{} (history {})",
                self.server.bind, self.server.port, self.server.history_capacity
            );
        }
        if self.cluster.role.runs_monitor() {
            let c = &self.client;
            info!(
                "monitor: {} endpoint(s), timeout {}ms, {} attempts, retry delay {}ms",
                c.endpoints.len(),
                c.timeout_ms,
                c.retry_attempts,
                c.retry_delay_ms
            );
            info!(
                "refresh: every {}s [{}-{}s], auto {}",
                c.refresh_interval_seconds,
                c.min_refresh_interval_seconds,
                c.max_refresh_interval_seconds,
                c.auto_refresh
            );
        }
        info!("log level: {}", self.logging.level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.history_capacity, 50);
        assert_eq!(config.client.endpoints.len(), 3);
        assert_eq!(config.cluster.role, Role::Standalone);
        assert!(config.validate().is_ok());

        let policy = config.client.retry_policy();
        assert_eq!(policy.timeout, Duration::from_secs(2));
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
        assert_eq!(config.client.refresh_settings().interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = HostConfig::parse(
            r#"
            [client]
            endpoints = ["http://10.0.0.5:3000/api/current-data"]
            history_capacity = 10
            refresh_interval_seconds = 2

            [cluster]
            role = "monitor"
            "#,
        )
        .unwrap();

        assert_eq!(config.cluster.role, Role::Monitor);
        assert_eq!(config.client.endpoints, vec!["http://10.0.0.5:3000/api/current-data"]);
        assert_eq!(config.client.history_capacity, 10);
        assert_eq!(config.client.retry_attempts, 3);
        assert_eq!(config.server, ServerConfig::default());
        // clamped to the lower bound
        assert_eq!(config.client.refresh_settings().interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        let mut config = HostConfig::default();
        config.client.endpoints.clear();
        assert!(config.validate().is_err());

        // hub role does not care about the client section
        config.cluster.role = Role::Hub;
        assert!(config.validate().is_ok());

        config.server.bind = "not-an-ip".into();
        assert!(config.validate().is_err());

        let mut config = HostConfig::default();
        config.client.min_refresh_interval_seconds = 90;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let shipped = HostConfig::parse(include_str!("../config/host.toml")).unwrap();
        assert_eq!(shipped, HostConfig::default());
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(HostConfig::parse("[server]\nport = \"three thousand\"").is_err());
        assert!(HostConfig::parse("[cluster]\nrole = \"spoke\"").is_err());
    }
}
