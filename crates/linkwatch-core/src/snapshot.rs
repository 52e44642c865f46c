//! Per-cycle connectivity input consumed by the classifier.
//!
//! These types are the contract between the probe collaborator and the core:
//! the core never gathers a snapshot itself, only fuses one it is handed.

use serde::{Deserialize, Serialize};

/// Result of pinging a single host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingOutcome {
    pub host: String,
    pub success: bool,
    pub latency_ms: Option<f64>,
}

/// Result of a DNS resolution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsOutcome {
    pub hostname: String,
    pub success: bool,
    pub latency_ms: Option<f64>,
}

/// Result of an optional HTTP reachability probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpOutcome {
    pub url: String,
    pub success: bool,
    pub status: Option<u16>,
    pub latency_ms: Option<f64>,
}

/// Wireless link signal quality, read fresh each cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkMetrics {
    pub rssi: Option<i32>,
    pub bitrate_mbps: Option<f64>,
}

/// One cycle's worth of connectivity evidence, consumed exactly once by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivitySnapshot {
    pub ping_results: Vec<PingOutcome>,
    pub dns_result: Option<DnsOutcome>,
    pub http_result: Option<HttpOutcome>,
    pub link: LinkMetrics,
}

impl ConnectivitySnapshot {
    /// Fraction of configured pings that succeeded this cycle; 0.0 if no pings were run.
    ///
    /// A cycle with zero probes is treated as unhealthy, not neutral — "probe source
    /// unavailable" must never be mistaken for "link is fine."
    pub fn success_ratio(&self) -> f64 {
        if self.ping_results.is_empty() {
            return 0.0;
        }
        let successes = self.ping_results.iter().filter(|p| p.success).count();
        successes as f64 / self.ping_results.len() as f64
    }
}
