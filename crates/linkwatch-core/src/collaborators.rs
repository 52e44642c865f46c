//! Traits the escalation manager depends on but never implements itself.
//!
//! Keeping these as traits is what lets `linkwatch-core` stay pure: no
//! process spawning, no filesystem access, no wall-clock reads happen inside
//! this crate. Production implementations live in `linkwatch-recovery`,
//! `linkwatch-persist`, and a thin `SystemClock`/`SystemUptime` pair here.

use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::config::TierSpec;

/// Performs the side-effecting action behind one escalation tier.
///
/// Unknown tier names must return `false` and are expected to be logged by
/// the implementation, not by the core.
pub trait RecoveryExecutor {
    fn invoke(&self, tier: &TierSpec) -> bool;
}

/// Monotonic and wall-clock time, abstracted so tests can control both.
pub trait Clock {
    /// Used for all cool-down and spacing comparisons. Must never go backwards.
    fn monotonic_now(&self) -> Instant;
    /// Used only for the calendar-day reboot quota reset.
    fn local_today(&self) -> NaiveDate;
}

/// Real clock backed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }

    fn local_today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Seconds since boot. `None` means "not checkable" — never a reason to deny a reboot.
pub trait UptimeSource {
    fn uptime(&self) -> Option<Duration>;
}

/// Reads `/proc/uptime`. Returns `None` on any I/O or parse failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcUptime;

impl UptimeSource for ProcUptime {
    fn uptime(&self) -> Option<Duration> {
        let content = std::fs::read_to_string("/proc/uptime").ok()?;
        let first = content.split_whitespace().next()?;
        let secs: f64 = first.parse().ok()?;
        Some(Duration::from_secs_f64(secs.max(0.0)))
    }
}

/// The persisted reboot-quota counter: `(calendar day, reboots so far that day)`.
pub trait RebootStateStore {
    /// `None` on a missing or unparsable file — treated as "no prior attempts today."
    fn read(&self) -> Option<(NaiveDate, u32)>;
    /// Best-effort; write failures are logged by the implementation, never propagated.
    fn write(&self, date: NaiveDate, count: u32);
}

/// A `RebootStateStore` that keeps no state at all — useful for tests and for
/// deployments that intentionally accept under-counting across restarts.
#[derive(Debug, Default)]
pub struct NullRebootStateStore;

impl RebootStateStore for NullRebootStateStore {
    fn read(&self) -> Option<(NaiveDate, u32)> {
        None
    }

    fn write(&self, _date: NaiveDate, _count: u32) {}
}
