//! linkwatchd — network-link watchdog daemon.
//!
//! Probes connectivity, classifies link health across a sliding window, and
//! escalates through a graduated ladder of recovery actions when the link
//! degrades, with safety guards against reboot storms.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use linkwatch_config::WatchdogConfig;
use linkwatch_core::{EscalationManager, HealthWindow, ProcUptime, SystemClock};
use linkwatch_persist::FileRebootStateStore;
use linkwatch_recovery::ProcessRecoveryExecutor;
use linkwatchd::cycle::{run_once, CycleContext};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "linkwatchd")]
#[command(about = "Network-link watchdog daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watchdog loop.
    Run {
        #[arg(short, long, default_value = "/etc/linkwatchd/config.yaml")]
        config: PathBuf,
    },
    /// Load and validate a config file, then exit.
    CheckConfig {
        #[arg(short, long, default_value = "/etc/linkwatchd/config.yaml")]
        config: PathBuf,
    },
    /// Write a default config file for the given interface.
    InitConfig {
        #[arg(short, long, default_value = "/etc/linkwatchd/config.yaml")]
        output: PathBuf,
        #[arg(long, default_value = "wlan0")]
        interface: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = WatchdogConfig::load(&config)?;
            init_tracing(&config.logging);
            run_watchdog(config).await?;
        }
        Commands::CheckConfig { config } => {
            check_config(config)?;
        }
        Commands::InitConfig { output, interface } => {
            init_config(output, interface)?;
        }
    }

    Ok(())
}

fn init_tracing(logging: &linkwatch_config::LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn run_watchdog(config: WatchdogConfig) -> anyhow::Result<()> {
    info!(
        interface = %config.interface,
        check_interval_seconds = config.check_interval_seconds,
        "starting linkwatchd"
    );

    std::fs::create_dir_all(&config.paths.state_dir)?;
    let reboot_state_path = config.paths.state_dir.join("reboot_state");
    let reboot_store = FileRebootStateStore::new(reboot_state_path);

    let core_config = config.to_core();
    let window = HealthWindow::new(core_config.history_size);
    let escalation = EscalationManager::new(&core_config, SystemClock, ProcUptime, reboot_store);
    let executor = ProcessRecoveryExecutor::new(
        config.interface.clone(),
        Duration::from_secs(10),
        config.features.dry_run,
    );

    let mut ctx = CycleContext { config, window, escalation, executor };
    let mut timer = linkwatchd::adaptive::AdaptiveTimer::new(
        ctx.config.check_interval_seconds,
        ctx.config.adaptive,
    );

    let shutdown = install_signal_handlers().await?;

    while !shutdown.load(Ordering::Relaxed) {
        let classification = run_once(&mut ctx).await;
        timer.observe(classification.state);

        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        tokio::time::sleep(Duration::from_secs(timer.current_interval_secs())).await;
    }

    info!("shutdown signal received, exiting");
    Ok(())
}

/// Sets a flag on SIGTERM/SIGINT, checked between cycles (graceful shutdown,
/// never mid-cycle). SIGTERM registration happens here, outside the spawned
/// task, so a failure to install the handler fails startup via `?` instead
/// of silently killing shutdown handling inside a detached task.
async fn install_signal_handlers() -> anyhow::Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        flag.store(true, Ordering::Relaxed);
    });
    Ok(shutdown)
}

fn check_config(path: PathBuf) -> anyhow::Result<()> {
    match WatchdogConfig::load(&path) {
        Ok(config) => {
            println!("{} is valid", path.display());
            println!("  interface: {}", config.interface);
            println!("  check_interval_seconds: {}", config.check_interval_seconds);
            println!("  escalation tiers: {}", config.escalation.tiers.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} is invalid: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn init_config(output: PathBuf, interface: String) -> anyhow::Result<()> {
    let config = linkwatch_config::default_config(interface);
    config.save(&output)?;
    println!("Config written to {}", output.display());
    println!();
    println!("Edit the file to match your network, then run:");
    println!("  linkwatchd run --config {}", output.display());
    Ok(())
}
