//! Inter-cycle sleep backoff, entirely local to the supervisor.
//!
//! Tracks its own consecutive-healthy counter, independent of the core's
//! ladder-reset counter — the two track the same signal for different
//! purposes and must not be merged (§4.8).

use linkwatch_config::AdaptiveConfig;
use linkwatch_core::HealthState;

/// Current inter-cycle sleep duration and the streak driving it.
pub struct AdaptiveTimer {
    base_interval_secs: u64,
    config: AdaptiveConfig,
    current_interval_secs: u64,
    consecutive_healthy: u32,
}

impl AdaptiveTimer {
    pub fn new(base_interval_secs: u64, config: AdaptiveConfig) -> Self {
        Self { base_interval_secs, config, current_interval_secs: base_interval_secs, consecutive_healthy: 0 }
    }

    pub fn current_interval_secs(&self) -> u64 {
        self.current_interval_secs
    }

    /// Update the interval for the next sleep given this cycle's classification.
    pub fn observe(&mut self, state: HealthState) {
        if !self.config.enabled {
            return;
        }

        if state == HealthState::Healthy {
            self.consecutive_healthy += 1;
            if self.consecutive_healthy >= self.config.healthy_cycles_for_backoff {
                let backed_off = (self.current_interval_secs as f64 * self.config.backoff_factor) as u64;
                self.current_interval_secs = backed_off.min(self.config.max_interval_seconds);
                self.consecutive_healthy = 0;
            }
        } else {
            self.consecutive_healthy = 0;
            self.current_interval_secs = self.base_interval_secs;
        }
    }
}
