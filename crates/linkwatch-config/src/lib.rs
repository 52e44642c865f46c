//! On-disk YAML configuration schema for `linkwatchd`.
//!
//! Loads and validates the full watchdog configuration, then carves out the
//! [`linkwatch_core::CoreConfig`] slice the classifier and escalation manager
//! need. Ambient fields (probe hosts, timeouts, paths, adaptive timing,
//! logging, feature flags) live only here — the core never sees them.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use linkwatch_core::{CoreConfig, EscalationSettings, Limits, Thresholds, TierSpec};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Signal thresholds as they appear on disk: the classifier-relevant bounds
/// plus the informational bitrate floor, which is surfaced in status output
/// only and never participates in classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub rssi_degraded: i32,
    pub rssi_lost: i32,
    #[serde(default)]
    pub min_bitrate_mbps: Option<u32>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self { rssi_degraded: -70, rssi_lost: -85, min_bitrate_mbps: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostsConfig {
    pub ping: Vec<String>,
    pub dns_lookup: String,
    #[serde(default)]
    pub http_probe: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_ping_timeout")]
    pub ping_ms: u64,
    #[serde(default = "default_dns_timeout")]
    pub dns_ms: u64,
    #[serde(default = "default_http_timeout")]
    pub http_ms: u64,
}

fn default_ping_timeout() -> u64 {
    1000
}
fn default_dns_timeout() -> u64 {
    1000
}
fn default_http_timeout() -> u64 {
    2000
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            ping_ms: default_ping_timeout(),
            dns_ms: default_dns_timeout(),
            http_ms: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    pub state_dir: PathBuf,
    pub status_json: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_backoff_cycles")]
    pub healthy_cycles_for_backoff: u32,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    pub max_interval_seconds: u64,
}

fn default_backoff_cycles() -> u32 {
    5
}
fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            healthy_cycles_for_backoff: default_backoff_cycles(),
            backoff_factor: default_backoff_factor(),
            max_interval_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDestination {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "default_log_destination")]
    pub destination: LogDestination,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_destination() -> LogDestination {
    LogDestination::Stderr
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false, destination: default_log_destination() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub prometheus_textfile: Option<PathBuf>,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self { prometheus_textfile: None, dry_run: false }
    }
}

/// The full on-disk watchdog configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    pub interface: String,
    pub check_interval_seconds: u64,
    pub history_size: usize,
    pub thresholds: Thresholds,
    pub signal: SignalConfig,
    pub hosts: HostsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    pub escalation: EscalationSettings,
    #[serde(default)]
    pub limits: Limits,
    pub paths: PathsConfig,
    #[serde(default)]
    pub adaptive: AdaptiveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Errors raised validating or loading a [`WatchdogConfig`]. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, #[source] source: serde_yaml::Error },
    #[error("invalid core configuration: {0}")]
    Core(#[from] linkwatch_core::ConfigError),
    #[error("check_interval_seconds must be >= 5, got {0}")]
    CheckIntervalTooShort(u64),
    #[error("hosts.ping must not be empty")]
    EmptyPingHosts,
    #[error("adaptive.max_interval_seconds ({max}) must be >= check_interval_seconds ({interval})")]
    AdaptiveCeilingTooLow { max: u64, interval: u64 },
    #[error("adaptive.backoff_factor must be > 1.0, got {0}")]
    InvalidBackoffFactor(f64),
}

impl WatchdogConfig {
    /// Load from a YAML file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigLoadError::Read { path: path.to_path_buf(), source })?;
        let config: WatchdogConfig = serde_yaml::from_str(&content)
            .map_err(|source| ConfigLoadError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded watchdog config");
        Ok(config)
    }

    /// Serialize to YAML and write to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigLoadError> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|source| ConfigLoadError::Parse { path: path.to_path_buf(), source })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| ConfigLoadError::Read { path: path.to_path_buf(), source })?;
        }
        std::fs::write(path, yaml)
            .map_err(|source| ConfigLoadError::Read { path: path.to_path_buf(), source })
    }

    /// Check ambient-field invariants, then delegate thresholds/escalation/limits
    /// consistency to [`linkwatch_core::CoreConfig::validate`].
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.check_interval_seconds < 5 {
            return Err(ConfigLoadError::CheckIntervalTooShort(self.check_interval_seconds));
        }
        if self.hosts.ping.is_empty() {
            return Err(ConfigLoadError::EmptyPingHosts);
        }
        if self.adaptive.enabled {
            if self.adaptive.max_interval_seconds < self.check_interval_seconds {
                return Err(ConfigLoadError::AdaptiveCeilingTooLow {
                    max: self.adaptive.max_interval_seconds,
                    interval: self.check_interval_seconds,
                });
            }
            if self.adaptive.backoff_factor <= 1.0 {
                return Err(ConfigLoadError::InvalidBackoffFactor(self.adaptive.backoff_factor));
            }
        }
        self.to_core().validate()?;
        Ok(())
    }

    /// Carve out the slice of this configuration the core engine consumes.
    pub fn to_core(&self) -> CoreConfig {
        CoreConfig {
            history_size: self.history_size,
            thresholds: self.thresholds,
            signal: linkwatch_core::SignalThresholds {
                rssi_degraded: self.signal.rssi_degraded,
                rssi_lost: self.signal.rssi_lost,
            },
            escalation: self.escalation.clone(),
            limits: self.limits,
        }
    }
}

/// A default configuration suitable as a starting point for `linkwatchd init-config`.
pub fn default_config(interface: impl Into<String>) -> WatchdogConfig {
    WatchdogConfig {
        interface: interface.into(),
        check_interval_seconds: 30,
        history_size: 10,
        thresholds: Thresholds::default(),
        signal: SignalConfig::default(),
        hosts: HostsConfig {
            ping: vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()],
            dns_lookup: "example.com".to_string(),
            http_probe: None,
        },
        timeouts: TimeoutsConfig::default(),
        escalation: EscalationSettings {
            healthy_reset_consecutive: 3,
            tiers: vec![
                TierSpec {
                    name: "refresh_dhcp".to_string(),
                    enabled: true,
                    min_interval_seconds: 120,
                    services: vec![],
                    device_id: None,
                    hub_port: None,
                },
                TierSpec {
                    name: "cycle_interface".to_string(),
                    enabled: true,
                    min_interval_seconds: 300,
                    services: vec![],
                    device_id: None,
                    hub_port: None,
                },
                TierSpec {
                    name: "reboot".to_string(),
                    enabled: true,
                    min_interval_seconds: 3600,
                    services: vec![],
                    device_id: None,
                    hub_port: None,
                },
            ],
        },
        limits: Limits::default(),
        paths: PathsConfig {
            state_dir: PathBuf::from("/var/lib/linkwatchd"),
            status_json: PathBuf::from("/var/lib/linkwatchd/status.json"),
        },
        adaptive: AdaptiveConfig::default(),
        logging: LoggingConfig::default(),
        features: FeaturesConfig::default(),
    }
}
