//! Sequences one watchdog cycle: gather, classify, escalate, publish.

use linkwatch_config::WatchdogConfig;
use linkwatch_core::{ClassificationResult, EscalationManager, HealthWindow};
use linkwatch_recovery::ProcessRecoveryExecutor;
use linkwatch_status::{ActionHistoryRecord, StatusReport};
use tracing::info;

/// Everything one cycle needs beyond the configuration itself.
pub struct CycleContext<C, U, S> {
    pub config: WatchdogConfig,
    pub window: HealthWindow,
    pub escalation: EscalationManager<C, U, S>,
    pub executor: ProcessRecoveryExecutor,
}

/// Run exactly one cycle: gather a snapshot, classify it, consult the
/// escalation ladder, and publish status/metrics/history. Returns the
/// classification so the caller can drive adaptive timing.
pub async fn run_once<C, U, S>(ctx: &mut CycleContext<C, U, S>) -> ClassificationResult
where
    C: linkwatch_core::Clock,
    U: linkwatch_core::UptimeSource,
    S: linkwatch_core::RebootStateStore,
{
    let snapshot = linkwatch_probe::gather_snapshot(
        &ctx.config.interface,
        &ctx.config.hosts.ping,
        ctx.config.timeouts.ping_ms,
        &ctx.config.hosts.dns_lookup,
        ctx.config.timeouts.dns_ms,
        ctx.config.hosts.http_probe.as_deref(),
        ctx.config.timeouts.http_ms,
    )
    .await;

    let core_config = ctx.config.to_core();
    let classification = linkwatch_core::classify(&core_config, &snapshot, &mut ctx.window);

    ctx.escalation.record_health(&classification);
    let invoked_tier = ctx.escalation.maybe_escalate(&classification, &ctx.executor);

    info!(
        state = ?classification.state,
        fail_ratio = classification.fail_ratio,
        consecutive = classification.consecutive_fail_packets,
        rssi = ?classification.rssi,
        invoked_tier = ?invoked_tier,
        "cycle complete"
    );

    linkwatch_status::write_status(
        &ctx.config.paths.status_json,
        &StatusReport::new(&classification, invoked_tier.clone()),
    );
    if let Some(prom_path) = &ctx.config.features.prometheus_textfile {
        linkwatch_status::write_prometheus(prom_path, &classification);
    }
    linkwatch_status::append_action_history(
        &ctx.config.paths.state_dir.join("history.jsonl"),
        &ActionHistoryRecord::new(&classification, invoked_tier),
    );

    classification
}
