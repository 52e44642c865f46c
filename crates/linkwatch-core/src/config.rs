//! Core configuration types: the slice of the full watchdog configuration that
//! the classifier and escalation manager actually consume.
//!
//! `linkwatch-config` owns the full on-disk schema (hosts, timeouts, paths,
//! logging, adaptive timing) and embeds these types verbatim for the fields
//! that drive classification and escalation decisions.

use serde::{Deserialize, Serialize};

/// Fail-ratio and consecutive-unhealthy thresholds for DEGRADED/LOST.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub degraded_fail_ratio: f64,
    pub lost_fail_ratio: f64,
    pub degraded_consecutive: usize,
    pub lost_consecutive: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            degraded_fail_ratio: 0.4,
            lost_fail_ratio: 0.8,
            degraded_consecutive: 3,
            lost_consecutive: 6,
        }
    }
}

/// RSSI thresholds for signal-driven classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    pub rssi_degraded: i32,
    pub rssi_lost: i32,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self { rssi_degraded: -70, rssi_lost: -85 }
    }
}

/// Safety limits governing the `reboot` tier specifically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub max_reboots_per_day: u32,
    pub min_uptime_before_reboot_secs: u64,
    pub min_seconds_between_reboots: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_reboots_per_day: 2,
            min_uptime_before_reboot_secs: 180,
            min_seconds_between_reboots: 3600,
        }
    }
}

/// A single rung of the escalation ladder.
///
/// The core treats everything except the `name == "reboot"` special case
/// opaquely; action-specific fields (`services`, `device_id`, `hub_port`) are
/// only interpreted by the recovery executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub min_interval_seconds: u64,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub hub_port: Option<String>,
}

fn default_true() -> bool {
    true
}

pub const TIER_REBOOT: &str = "reboot";

/// Escalation-wide settings: the healthy-reset streak and the ordered tier ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationSettings {
    pub healthy_reset_consecutive: u32,
    pub tiers: Vec<TierSpec>,
}

/// The subset of the watchdog configuration the core needs: thresholds, signal
/// bounds, the escalation ladder, and reboot safety limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub history_size: usize,
    pub thresholds: Thresholds,
    pub signal: SignalThresholds,
    pub escalation: EscalationSettings,
    pub limits: Limits,
}

/// Errors raised validating a [`CoreConfig`]. Fatal at startup; the core is
/// never constructed from an invalid configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("history_size must be >= 1")]
    EmptyHistory,
    #[error("thresholds.degraded_fail_ratio ({degraded}) must be < thresholds.lost_fail_ratio ({lost})")]
    ThresholdsMisordered { degraded: f64, lost: f64 },
    #[error(
        "thresholds.lost_consecutive ({lost}) must be >= thresholds.degraded_consecutive ({degraded})"
    )]
    ConsecutiveMisordered { degraded: usize, lost: usize },
    #[error("signal.rssi_lost ({lost}) must be <= signal.rssi_degraded ({degraded})")]
    RssiMisordered { degraded: i32, lost: i32 },
    #[error("escalation.healthy_reset_consecutive must be >= 1")]
    ZeroHealthyReset,
    #[error("escalation.tiers must not be empty")]
    EmptyTiers,
    #[error("duplicate escalation tier name: {0}")]
    DuplicateTierName(String),
}

impl CoreConfig {
    /// Validate internal consistency (§3 invariants). Construction of
    /// [`crate::EscalationManager`] should only proceed past a successful validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_size == 0 {
            return Err(ConfigError::EmptyHistory);
        }
        if self.thresholds.degraded_fail_ratio >= self.thresholds.lost_fail_ratio {
            return Err(ConfigError::ThresholdsMisordered {
                degraded: self.thresholds.degraded_fail_ratio,
                lost: self.thresholds.lost_fail_ratio,
            });
        }
        if self.thresholds.lost_consecutive < self.thresholds.degraded_consecutive {
            return Err(ConfigError::ConsecutiveMisordered {
                degraded: self.thresholds.degraded_consecutive,
                lost: self.thresholds.lost_consecutive,
            });
        }
        if self.signal.rssi_lost > self.signal.rssi_degraded {
            return Err(ConfigError::RssiMisordered {
                degraded: self.signal.rssi_degraded,
                lost: self.signal.rssi_lost,
            });
        }
        if self.escalation.healthy_reset_consecutive == 0 {
            return Err(ConfigError::ZeroHealthyReset);
        }
        if self.escalation.tiers.is_empty() {
            return Err(ConfigError::EmptyTiers);
        }
        let mut seen = std::collections::HashSet::new();
        for tier in &self.escalation.tiers {
            if !seen.insert(tier.name.as_str()) {
                return Err(ConfigError::DuplicateTierName(tier.name.clone()));
            }
        }
        Ok(())
    }
}
