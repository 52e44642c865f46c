//! Gathers one cycle's [`linkwatch_core::ConnectivitySnapshot`].
//!
//! Every function here is infallible and best-effort: a probe that cannot run
//! (missing binary, timeout, DNS failure) degrades to a failed/absent outcome
//! rather than propagating an error — the classifier treats "couldn't check"
//! the same as "checked and failed."

#![forbid(unsafe_code)]

use std::time::Duration;

use linkwatch_core::{ConnectivitySnapshot, DnsOutcome, HttpOutcome, LinkMetrics, PingOutcome};
use tokio::process::Command;
use tracing::warn;

/// Ping every host in `hosts` once, each bounded by `timeout_ms`.
pub async fn ping_hosts(hosts: &[String], timeout_ms: u64) -> Vec<PingOutcome> {
    let mut results = Vec::with_capacity(hosts.len());
    for host in hosts {
        let success = ping_one(host, timeout_ms).await;
        results.push(PingOutcome { host: host.clone(), success, latency_ms: None });
    }
    results
}

async fn ping_one(host: &str, timeout_ms: u64) -> bool {
    let timeout_secs = (timeout_ms / 1000).max(1);
    let run = Command::new("ping")
        .args(["-c", "1", "-W", &timeout_secs.to_string(), host])
        .output();
    match tokio::time::timeout(Duration::from_millis(timeout_ms + 1000), run).await {
        Ok(Ok(output)) => output.status.success(),
        Ok(Err(e)) => {
            warn!(host, error = %e, "ping command failed to spawn");
            false
        }
        Err(_) => {
            warn!(host, "ping timed out");
            false
        }
    }
}

/// Resolve `hostname`, bounded by `timeout_ms`.
pub async fn dns_lookup(hostname: &str, timeout_ms: u64) -> DnsOutcome {
    let target = format!("{hostname}:0");
    let lookup = tokio::net::lookup_host(target);
    let success = tokio::time::timeout(Duration::from_millis(timeout_ms), lookup)
        .await
        .map(|r| r.map(|mut addrs| addrs.next().is_some()).unwrap_or(false))
        .unwrap_or(false);
    DnsOutcome { hostname: hostname.to_string(), success, latency_ms: None }
}

/// HEAD-probe `url`, bounded by `timeout_ms`. Success iff `200 <= status < 400`.
pub async fn http_probe(url: &str, timeout_ms: u64) -> Option<HttpOutcome> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .ok()?;
    match client.head(url).send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let success = (200..400).contains(&status);
            Some(HttpOutcome { url: url.to_string(), success, status: Some(status), latency_ms: None })
        }
        Err(e) => {
            warn!(url, error = %e, "http probe failed");
            Some(HttpOutcome { url: url.to_string(), success: false, status: None, latency_ms: None })
        }
    }
}

/// Read wireless link signal quality via `iw dev <interface> link`.
///
/// Any failure (command missing, non-zero exit, unparsable output) yields
/// `{ rssi: None, bitrate_mbps: None }`; absent signal is routine, not exceptional.
pub async fn link_metrics(interface: &str) -> LinkMetrics {
    let run = Command::new("iw").args(["dev", interface, "link"]).output();
    let output = match tokio::time::timeout(Duration::from_secs(2), run).await {
        Ok(Ok(output)) if output.status.success() => output,
        _ => return LinkMetrics::default(),
    };
    parse_iw_link(&String::from_utf8_lossy(&output.stdout))
}

fn parse_iw_link(stdout: &str) -> LinkMetrics {
    let mut rssi = None;
    let mut bitrate_mbps = None;
    for line in stdout.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("signal:") {
            rssi = rest.split_whitespace().next().and_then(|v| v.parse().ok());
        } else if let Some(rest) = line.strip_prefix("tx bitrate:") {
            bitrate_mbps = rest.split_whitespace().next().and_then(|v| v.parse().ok());
        }
    }
    LinkMetrics { rssi, bitrate_mbps }
}

/// Gather a full [`ConnectivitySnapshot`] for one cycle.
pub async fn gather_snapshot(
    interface: &str,
    ping: &[String],
    ping_timeout_ms: u64,
    dns_hostname: &str,
    dns_timeout_ms: u64,
    http_url: Option<&str>,
    http_timeout_ms: u64,
) -> ConnectivitySnapshot {
    let ping_results = ping_hosts(ping, ping_timeout_ms).await;
    let dns_result = Some(dns_lookup(dns_hostname, dns_timeout_ms).await);
    let http_result = match http_url {
        Some(url) => http_probe(url, http_timeout_ms).await,
        None => None,
    };
    let link = link_metrics(interface).await;
    ConnectivitySnapshot { ping_results, dns_result, http_result, link }
}
