//! Translates a stream of classifications into recovery tier invocations.

use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::classifier::{ClassificationResult, HealthState};
use crate::collaborators::{Clock, RebootStateStore, RecoveryExecutor, UptimeSource};
use crate::config::{CoreConfig, TierSpec, TIER_REBOOT};

#[derive(Debug, Clone, Copy)]
struct TierState {
    last_invoked: Option<Instant>,
}

impl Default for TierState {
    fn default() -> Self {
        Self { last_invoked: None }
    }
}

/// Owns the escalation ladder, per-tier cool-downs, the healthy-streak counter,
/// and the reboot safety guards (daily quota, uptime floor, spacing).
///
/// Not re-entrant: a single `EscalationManager` must not be driven by more
/// than one caller concurrently. Callers must invoke [`Self::record_health`]
/// before [`Self::maybe_escalate`] in every cycle (§5 ordering guarantee).
pub struct EscalationManager<C, U, S> {
    tiers: Vec<TierSpec>,
    tier_states: HashMap<String, TierState>,
    current_index: usize,
    consecutive_healthy: u32,
    healthy_reset_consecutive: u32,
    limits: crate::config::Limits,

    reboot_day: NaiveDate,
    reboots_today: u32,
    last_reboot_ts: Option<Instant>,

    clock: C,
    uptime: U,
    reboot_store: S,
}

impl<C: Clock, U: UptimeSource, S: RebootStateStore> EscalationManager<C, U, S> {
    /// Construct a manager from `config`, loading any persisted reboot quota
    /// for today via `reboot_store` (tolerating absence or corruption).
    pub fn new(config: &CoreConfig, clock: C, uptime: U, reboot_store: S) -> Self {
        let today = clock.local_today();
        let (reboot_day, reboots_today) = match reboot_store.read() {
            Some((day, count)) if day == today => (day, count),
            _ => (today, 0),
        };

        let tier_states = config
            .escalation
            .tiers
            .iter()
            .map(|t| (t.name.clone(), TierState::default()))
            .collect();

        Self {
            tiers: config.escalation.tiers.clone(),
            tier_states,
            current_index: 0,
            consecutive_healthy: 0,
            healthy_reset_consecutive: config.escalation.healthy_reset_consecutive,
            limits: config.limits,
            reboot_day,
            reboots_today,
            last_reboot_ts: None,
            clock,
            uptime,
            reboot_store,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn consecutive_healthy(&self) -> u32 {
        self.consecutive_healthy
    }

    pub fn reboots_today(&self) -> u32 {
        self.reboots_today
    }

    /// Update the healthy-streak counter and reset the ladder when the
    /// streak reaches `healthy_reset_consecutive`. The streak is not itself
    /// reset on trigger — a continuing healthy run keeps the ladder at 0.
    pub fn record_health(&mut self, classification: &ClassificationResult) {
        if classification.state == HealthState::Healthy {
            self.consecutive_healthy += 1;
            if self.consecutive_healthy >= self.healthy_reset_consecutive {
                if self.current_index != 0 {
                    info!(consecutive_healthy = self.consecutive_healthy, "ladder reset to index 0");
                }
                self.current_index = 0;
            }
        } else {
            self.consecutive_healthy = 0;
        }
    }

    /// Decide whether to invoke a recovery tier this cycle, and do so.
    ///
    /// Returns the invoked tier's name, or `None` if nothing was invoked.
    pub fn maybe_escalate(
        &mut self,
        classification: &ClassificationResult,
        executor: &dyn RecoveryExecutor,
    ) -> Option<String> {
        if classification.state == HealthState::Healthy {
            return None;
        }

        let idx = self.current_index.min(self.tiers.len() - 1);
        let tier = self.tiers[idx].clone();

        if !tier.enabled {
            return None;
        }

        let now = self.clock.monotonic_now();
        let state = self.tier_states.entry(tier.name.clone()).or_default();
        if let Some(last) = state.last_invoked {
            if now.duration_since(last).as_secs() < tier.min_interval_seconds {
                return None;
            }
        }

        if tier.name == TIER_REBOOT && !self.allow_reboot(now) {
            warn!(tier = %tier.name, "reboot denied by safety guard");
            return None;
        }

        info!(tier = %tier.name, state = ?classification.state, "invoking recovery tier");
        let success = executor.invoke(&tier);

        self.tier_states
            .entry(tier.name.clone())
            .or_default()
            .last_invoked = Some(now);

        if tier.name == TIER_REBOOT && success {
            self.reboots_today += 1;
            self.last_reboot_ts = Some(now);
            self.reboot_store.write(self.reboot_day, self.reboots_today);
        }

        if !success {
            warn!(tier = %tier.name, "recovery action failed; ladder still advances");
        }

        if self.current_index < self.tiers.len() - 1 {
            self.current_index += 1;
        }

        Some(tier.name)
    }

    /// Quota/uptime/spacing gate, checked only for the `reboot` tier.
    fn allow_reboot(&mut self, now: Instant) -> bool {
        let today = self.clock.local_today();
        if today != self.reboot_day {
            self.reboot_day = today;
            self.reboots_today = 0;
        }

        if self.reboots_today >= self.limits.max_reboots_per_day {
            return false;
        }

        if let Some(uptime) = self.uptime.uptime() {
            if uptime.as_secs() < self.limits.min_uptime_before_reboot_secs {
                info!(uptime_secs = uptime.as_secs(), "skipping reboot: minimum uptime not met");
                return false;
            }
        }

        if let Some(last) = self.last_reboot_ts {
            if now.duration_since(last).as_secs() < self.limits.min_seconds_between_reboots {
                info!("skipping reboot: spacing guard not satisfied");
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EscalationSettings, Limits, SignalThresholds, Thresholds};
    use std::cell::Cell;
    use std::collections::HashMap as Map;
    use std::sync::Mutex;

    struct FakeClock {
        now: Cell<Instant>,
        today: Cell<NaiveDate>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                now: Cell::new(Instant::now()),
                today: Cell::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            }
        }

        fn advance(&self, secs: u64) {
            self.now.set(self.now.get() + std::time::Duration::from_secs(secs));
        }

        fn set_day(&self, d: NaiveDate) {
            self.today.set(d);
        }
    }

    impl Clock for &FakeClock {
        fn monotonic_now(&self) -> Instant {
            self.now.get()
        }

        fn local_today(&self) -> NaiveDate {
            self.today.get()
        }
    }

    struct FakeUptime(Cell<Option<std::time::Duration>>);

    impl UptimeSource for &FakeUptime {
        fn uptime(&self) -> Option<std::time::Duration> {
            self.0.get()
        }
    }

    #[derive(Default)]
    struct FakeStore(Mutex<Option<(NaiveDate, u32)>>);

    impl RebootStateStore for &FakeStore {
        fn read(&self) -> Option<(NaiveDate, u32)> {
            *self.0.lock().unwrap()
        }

        fn write(&self, date: NaiveDate, count: u32) {
            *self.0.lock().unwrap() = Some((date, count));
        }
    }

    struct RecordingExecutor {
        invoked: Mutex<Vec<String>>,
        outcomes: Map<String, bool>,
    }

    impl RecordingExecutor {
        fn always_succeed() -> Self {
            Self { invoked: Mutex::new(vec![]), outcomes: Map::new() }
        }

        fn with_outcome(name: &str, ok: bool) -> Self {
            let mut outcomes = Map::new();
            outcomes.insert(name.to_string(), ok);
            Self { invoked: Mutex::new(vec![]), outcomes }
        }
    }

    impl RecoveryExecutor for RecordingExecutor {
        fn invoke(&self, tier: &TierSpec) -> bool {
            self.invoked.lock().unwrap().push(tier.name.clone());
            *self.outcomes.get(&tier.name).unwrap_or(&true)
        }
    }

    fn config(tiers: Vec<TierSpec>, healthy_reset: u32) -> CoreConfig {
        CoreConfig {
            history_size: 10,
            thresholds: Thresholds {
                degraded_fail_ratio: 0.4,
                lost_fail_ratio: 0.8,
                degraded_consecutive: 3,
                lost_consecutive: 6,
            },
            signal: SignalThresholds { rssi_degraded: -70, rssi_lost: -85 },
            escalation: EscalationSettings { healthy_reset_consecutive: healthy_reset, tiers },
            limits: Limits {
                max_reboots_per_day: 1,
                min_uptime_before_reboot_secs: 0,
                min_seconds_between_reboots: 9999,
            },
        }
    }

    fn tier(name: &str, min_interval: u64) -> TierSpec {
        TierSpec {
            name: name.to_string(),
            enabled: true,
            min_interval_seconds: min_interval,
            services: vec![],
            device_id: None,
            hub_port: None,
        }
    }

    fn degraded() -> ClassificationResult {
        ClassificationResult { state: HealthState::Degraded, fail_ratio: 0.5, consecutive_fail_packets: 3, rssi: Some(-60) }
    }

    fn lost() -> ClassificationResult {
        ClassificationResult { state: HealthState::Lost, fail_ratio: 1.0, consecutive_fail_packets: 10, rssi: Some(-90) }
    }

    fn healthy() -> ClassificationResult {
        ClassificationResult { state: HealthState::Healthy, fail_ratio: 0.0, consecutive_fail_packets: 0, rssi: Some(-50) }
    }

    #[test]
    fn ladder_progresses_then_saturates() {
        let cfg = config(vec![tier("refresh_dhcp", 0), tier("reboot", 0)], 2);
        let clock = FakeClock::new();
        let uptime = FakeUptime(Cell::new(Some(std::time::Duration::from_secs(10_000))));
        let store = FakeStore::default();
        let mut mgr = EscalationManager::new(&cfg, &clock, &uptime, &store);
        let exec = RecordingExecutor::always_succeed();

        assert_eq!(mgr.maybe_escalate(&degraded(), &exec), Some("refresh_dhcp".to_string()));
        assert_eq!(mgr.maybe_escalate(&degraded(), &exec), Some("reboot".to_string()));
        // ladder saturated at index len-1: stays on reboot
        assert_eq!(mgr.maybe_escalate(&degraded(), &exec), Some("reboot".to_string()));
        assert_eq!(mgr.current_index(), 1);
    }

    #[test]
    fn healthy_reset_returns_ladder_to_zero() {
        let cfg = config(vec![tier("refresh_dhcp", 0), tier("reboot", 0)], 2);
        let clock = FakeClock::new();
        let uptime = FakeUptime(Cell::new(None));
        let store = FakeStore::default();
        let mut mgr = EscalationManager::new(&cfg, &clock, &uptime, &store);
        let exec = RecordingExecutor::always_succeed();

        mgr.record_health(&lost());
        mgr.maybe_escalate(&lost(), &exec);
        mgr.record_health(&lost());
        mgr.maybe_escalate(&lost(), &exec);
        assert_eq!(mgr.current_index(), 1);

        mgr.record_health(&healthy());
        assert_eq!(mgr.current_index(), 1); // one healthy cycle not enough
        mgr.record_health(&healthy());
        assert_eq!(mgr.current_index(), 0); // reset threshold reached

        mgr.record_health(&lost());
        let invoked = mgr.maybe_escalate(&lost(), &exec);
        assert_eq!(invoked, Some("refresh_dhcp".to_string()));
    }

    #[test]
    fn unhealthy_classification_always_clears_streak() {
        let cfg = config(vec![tier("refresh_dhcp", 0)], 3);
        let clock = FakeClock::new();
        let uptime = FakeUptime(Cell::new(None));
        let store = FakeStore::default();
        let mut mgr = EscalationManager::new(&cfg, &clock, &uptime, &store);

        mgr.record_health(&healthy());
        mgr.record_health(&healthy());
        assert_eq!(mgr.consecutive_healthy(), 2);
        mgr.record_health(&degraded());
        assert_eq!(mgr.consecutive_healthy(), 0);
        mgr.record_health(&degraded());
        assert_eq!(mgr.consecutive_healthy(), 0);
    }

    #[test]
    fn reboot_quota_denies_second_attempt_same_day() {
        let cfg = config(vec![tier("reboot", 0)], 2);
        let clock = FakeClock::new();
        let uptime = FakeUptime(Cell::new(Some(std::time::Duration::from_secs(10_000))));
        let store = FakeStore::default();
        let mut mgr = EscalationManager::new(&cfg, &clock, &uptime, &store);
        let exec = RecordingExecutor::always_succeed();

        let first = mgr.maybe_escalate(&lost(), &exec);
        assert_eq!(first, Some("reboot".to_string()));
        assert_eq!(mgr.reboots_today(), 1);
        let idx_after_first = mgr.current_index();

        let second = mgr.maybe_escalate(&lost(), &exec);
        assert_eq!(second, None);
        assert_eq!(mgr.current_index(), idx_after_first); // denial does not advance ladder
        assert_eq!(mgr.reboots_today(), 1);
    }

    #[test]
    fn reboot_denied_by_min_uptime() {
        let cfg = config(vec![tier("reboot", 0)], 2);
        let clock = FakeClock::new();
        let uptime = FakeUptime(Cell::new(Some(std::time::Duration::from_secs(5))));
        let mut cfg2 = cfg;
        cfg2.limits.min_uptime_before_reboot_secs = 180;
        let store = FakeStore::default();
        let mut mgr = EscalationManager::new(&cfg2, &clock, &uptime, &store);
        let exec = RecordingExecutor::always_succeed();

        assert_eq!(mgr.maybe_escalate(&lost(), &exec), None);
        assert_eq!(mgr.reboots_today(), 0);
    }

    #[test]
    fn reboot_spacing_guard_blocks_rapid_reattempt() {
        let mut cfg = config(vec![tier("reboot", 0)], 2);
        cfg.limits.max_reboots_per_day = 5;
        cfg.limits.min_seconds_between_reboots = 100;
        let clock = FakeClock::new();
        let uptime = FakeUptime(Cell::new(Some(std::time::Duration::from_secs(10_000))));
        let store = FakeStore::default();
        let mut mgr = EscalationManager::new(&cfg, &clock, &uptime, &store);
        let exec = RecordingExecutor::always_succeed();

        assert_eq!(mgr.maybe_escalate(&lost(), &exec), Some("reboot".to_string()));
        clock.advance(10); // still within spacing window
        assert_eq!(mgr.maybe_escalate(&lost(), &exec), None);
        clock.advance(100);
        assert_eq!(mgr.maybe_escalate(&lost(), &exec), Some("reboot".to_string()));
    }

    #[test]
    fn disabled_first_tier_pauses_the_ladder() {
        let tiers = vec![
            TierSpec { name: "refresh_dhcp".into(), enabled: false, min_interval_seconds: 0, services: vec![], device_id: None, hub_port: None },
            tier("reboot", 0),
        ];
        let cfg = config(tiers, 2);
        let clock = FakeClock::new();
        let uptime = FakeUptime(Cell::new(None));
        let store = FakeStore::default();
        let mut mgr = EscalationManager::new(&cfg, &clock, &uptime, &store);
        let exec = RecordingExecutor::always_succeed();

        assert_eq!(mgr.maybe_escalate(&lost(), &exec), None);
        assert_eq!(mgr.current_index(), 0);
    }

    #[test]
    fn cooldown_blocks_reinvocation_within_interval() {
        let cfg = config(vec![tier("refresh_dhcp", 60)], 2);
        let clock = FakeClock::new();
        let uptime = FakeUptime(Cell::new(None));
        let store = FakeStore::default();
        let mut mgr = EscalationManager::new(&cfg, &clock, &uptime, &store);
        let exec = RecordingExecutor::always_succeed();

        assert_eq!(mgr.maybe_escalate(&degraded(), &exec), Some("refresh_dhcp".to_string()));
        assert_eq!(mgr.maybe_escalate(&degraded(), &exec), None);
        clock.advance(61);
        assert_eq!(mgr.maybe_escalate(&degraded(), &exec), Some("refresh_dhcp".to_string()));
    }

    #[test]
    fn failed_action_still_advances_ladder() {
        let cfg = config(vec![tier("refresh_dhcp", 0), tier("reboot", 0)], 2);
        let clock = FakeClock::new();
        let uptime = FakeUptime(Cell::new(Some(std::time::Duration::from_secs(10_000))));
        let store = FakeStore::default();
        let mut mgr = EscalationManager::new(&cfg, &clock, &uptime, &store);
        let exec = RecordingExecutor::with_outcome("refresh_dhcp", false);

        assert_eq!(mgr.maybe_escalate(&degraded(), &exec), Some("refresh_dhcp".to_string()));
        assert_eq!(mgr.current_index(), 1);
    }

    #[test]
    fn healthy_classification_never_escalates() {
        let cfg = config(vec![tier("refresh_dhcp", 0)], 2);
        let clock = FakeClock::new();
        let uptime = FakeUptime(Cell::new(None));
        let store = FakeStore::default();
        let mut mgr = EscalationManager::new(&cfg, &clock, &uptime, &store);
        let exec = RecordingExecutor::always_succeed();
        assert_eq!(mgr.maybe_escalate(&healthy(), &exec), None);
    }

    #[test]
    fn reboot_quota_resets_on_day_rollover() {
        let cfg = config(vec![tier("reboot", 0)], 2);
        let clock = FakeClock::new();
        let uptime = FakeUptime(Cell::new(Some(std::time::Duration::from_secs(10_000))));
        let store = FakeStore::default();
        let mut mgr = EscalationManager::new(&cfg, &clock, &uptime, &store);
        let exec = RecordingExecutor::always_succeed();

        assert_eq!(mgr.maybe_escalate(&lost(), &exec), Some("reboot".to_string()));
        assert_eq!(mgr.maybe_escalate(&lost(), &exec), None); // quota hit

        clock.set_day(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        assert_eq!(mgr.maybe_escalate(&lost(), &exec), Some("reboot".to_string()));
        assert_eq!(mgr.reboots_today(), 1);
    }
}
