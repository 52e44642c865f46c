//! Link health classification and recovery escalation engine.
//!
//! This crate is pure: it never spawns a process, touches the filesystem, or
//! reads the wall clock directly. Every side-effecting dependency is a trait
//! in [`collaborators`], implemented by `linkwatch-probe`, `linkwatch-recovery`,
//! and `linkwatch-persist`.

#![forbid(unsafe_code)]

mod classifier;
mod collaborators;
mod config;
mod escalation;
mod snapshot;
mod window;

pub use classifier::{classify, ClassificationResult, HealthState};
pub use collaborators::{
    Clock, NullRebootStateStore, ProcUptime, RebootStateStore, RecoveryExecutor, SystemClock,
    UptimeSource,
};
pub use config::{
    ConfigError, CoreConfig, EscalationSettings, Limits, SignalThresholds, Thresholds, TierSpec,
    TIER_REBOOT,
};
pub use escalation::EscalationManager;
pub use snapshot::{ConnectivitySnapshot, DnsOutcome, HttpOutcome, LinkMetrics, PingOutcome};
pub use window::{HealthWindow, WindowEntry};
