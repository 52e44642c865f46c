//! Status file, Prometheus textfile, and action-history writers for `linkwatchd`.
//!
//! Every writer here is best-effort: a write failure is logged and swallowed,
//! never propagated — observability must not be able to take the watchdog down.

#![forbid(unsafe_code)]

use std::io::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use linkwatch_core::ClassificationResult;
use serde::Serialize;
use tracing::warn;

fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// One cycle's status snapshot, serialized to `paths.status_json`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub timestamp: DateTime<Utc>,
    pub state: linkwatch_core::HealthState,
    pub fail_ratio: f64,
    pub consecutive_fail_packets: usize,
    pub rssi: Option<i32>,
    pub invoked_tier: Option<String>,
}

impl StatusReport {
    pub fn new(classification: &ClassificationResult, invoked_tier: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            state: classification.state,
            fail_ratio: classification.fail_ratio,
            consecutive_fail_packets: classification.consecutive_fail_packets,
            rssi: classification.rssi,
            invoked_tier,
        }
    }
}

/// Overwrite `path` with the latest [`StatusReport`], atomically.
pub fn write_status(path: &Path, report: &StatusReport) {
    let content = match serde_json::to_string_pretty(report) {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, "failed to serialize status report");
            return;
        }
    };
    if let Err(e) = write_atomic(path, &content) {
        warn!(path = %path.display(), error = %e, "failed to write status file");
    }
}

/// Overwrite `path` with two Prometheus textfile-collector gauge lines:
/// `linkwatch_state{}` (1 if HEALTHY, else 0) and `linkwatch_fail_ratio`.
pub fn write_prometheus(path: &Path, classification: &ClassificationResult) {
    let state_value = if classification.state == linkwatch_core::HealthState::Healthy { 1 } else { 0 };
    let content = format!(
        "# HELP linkwatch_state 1 if the link is HEALTHY, 0 otherwise\n\
         # TYPE linkwatch_state gauge\n\
         linkwatch_state {state_value}\n\
         # HELP linkwatch_fail_ratio Fraction of unhealthy cycles in the observation window\n\
         # TYPE linkwatch_fail_ratio gauge\n\
         linkwatch_fail_ratio {}\n",
        classification.fail_ratio
    );
    if let Err(e) = write_atomic(path, &content) {
        warn!(path = %path.display(), error = %e, "failed to write prometheus textfile");
    }
}

/// One line of the append-only action history log.
#[derive(Debug, Clone, Serialize)]
pub struct ActionHistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub state: linkwatch_core::HealthState,
    pub fail_ratio: f64,
    pub consecutive_fail_packets: usize,
    pub rssi: Option<i32>,
    pub invoked_tier: Option<String>,
}

impl ActionHistoryRecord {
    pub fn new(classification: &ClassificationResult, invoked_tier: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            state: classification.state,
            fail_ratio: classification.fail_ratio,
            consecutive_fail_packets: classification.consecutive_fail_packets,
            rssi: classification.rssi,
            invoked_tier,
        }
    }
}

/// Append one JSON line to `path`, creating it and its parent directory if needed.
pub fn append_action_history(path: &Path, record: &ActionHistoryRecord) {
    let line = match serde_json::to_string(record) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "failed to serialize action history record");
            return;
        }
    };
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "failed to create history directory");
            return;
        }
    }
    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| writeln!(f, "{line}"));
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "failed to append action history");
    }
}
