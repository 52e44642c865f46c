//! Executes one rung of the recovery ladder as an OS-level action.
//!
//! [`ProcessRecoveryExecutor`] is the production `linkwatch_core::RecoveryExecutor`.
//! Every action runs through [`run_command`], which honors dry-run and a
//! per-command timeout and never panics on a missing binary or failed spawn.

#![forbid(unsafe_code)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use linkwatch_core::{RecoveryExecutor, TierSpec, TIER_REBOOT};
use tracing::{info, warn};

const TIER_REFRESH_DHCP: &str = "refresh_dhcp";
const TIER_RESTART_SERVICES: &str = "restart_network_services";
const TIER_CYCLE_INTERFACE: &str = "cycle_interface";
const TIER_RESET_USB: &str = "reset_usb_device";
const TIER_POWER_CYCLE_HUB: &str = "power_cycle_hub";

/// Outcome of one spawned process.
struct CommandOutcome {
    success: bool,
}

fn which(bin: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).map(|dir| dir.join(bin)).find(|p| p.is_file())
}

/// Run `argv` with a deadline of `timeout`, honoring `dry_run`.
///
/// In dry-run mode the command is logged but never spawned, and reports
/// success. A missing binary, spawn failure, or timeout reports failure.
fn run_command(argv: &[&str], timeout: Duration, dry_run: bool) -> CommandOutcome {
    if dry_run {
        info!(cmd = ?argv, "dry run, not executing");
        return CommandOutcome { success: true };
    }

    let mut child = match Command::new(argv[0])
        .args(&argv[1..])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!(cmd = ?argv, error = %e, "failed to spawn command");
            return CommandOutcome { success: false };
        }
    };

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    let mut stderr = String::new();
                    if let Some(mut s) = child.stderr.take() {
                        let _ = s.read_to_string(&mut stderr);
                    }
                    warn!(cmd = ?argv, status = ?status, stderr = %stderr.trim(), "command failed");
                }
                return CommandOutcome { success: status.success() };
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    warn!(cmd = ?argv, "command timed out, killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    return CommandOutcome { success: false };
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                warn!(cmd = ?argv, error = %e, "failed to poll command");
                return CommandOutcome { success: false };
            }
        }
    }
}

fn strategy_usbreset(vendor_prod: &str, timeout: Duration, dry_run: bool) -> bool {
    let Some(tool) = which("usbreset") else { return false };
    let ls = Command::new("lsusb").output();
    let Ok(ls) = ls else { return false };
    let stdout = String::from_utf8_lossy(&ls.stdout);
    let mut bus_dev = None;
    for line in stdout.lines() {
        if line.to_lowercase().contains(vendor_prod) {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 6 {
                let bus = parts[1];
                let dev = parts[3].trim_end_matches(':');
                bus_dev = Some(format!("/dev/bus/usb/{bus}/{dev}"));
                break;
            }
        }
    }
    let Some(path) = bus_dev else { return false };
    run_command(&[tool.to_string_lossy().as_ref(), &path], timeout, dry_run).success
}

fn strategy_unbind_rebind(vendor_prod: &str) -> bool {
    let Some((vid, pid)) = vendor_prod.split_once(':') else { return false };
    let sysfs = Path::new("/sys/bus/usb/devices");
    let Ok(entries) = std::fs::read_dir(sysfs) else { return false };
    for entry in entries.flatten() {
        let dir = entry.path();
        let (Ok(dev_vid), Ok(dev_pid)) = (
            std::fs::read_to_string(dir.join("idVendor")),
            std::fs::read_to_string(dir.join("idProduct")),
        ) else {
            continue;
        };
        if dev_vid.trim().eq_ignore_ascii_case(vid) && dev_pid.trim().eq_ignore_ascii_case(pid) {
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else { continue };
            let unbind = Path::new("/sys/bus/usb/drivers/usb/unbind");
            let bind = Path::new("/sys/bus/usb/drivers/usb/bind");
            if unbind.exists() && bind.exists() {
                if std::fs::write(unbind, name).is_err() {
                    continue;
                }
                std::thread::sleep(Duration::from_secs(1));
                return std::fs::write(bind, name).is_ok();
            }
        }
    }
    false
}

fn reset_usb(vendor_prod: &str, timeout: Duration, dry_run: bool) -> bool {
    let vendor_prod = vendor_prod.to_lowercase();
    if strategy_usbreset(&vendor_prod, timeout, dry_run) {
        return true;
    }
    strategy_unbind_rebind(&vendor_prod)
}

/// Production `RecoveryExecutor`: dispatches by tier name to an OS-level action.
pub struct ProcessRecoveryExecutor {
    interface: String,
    command_timeout: Duration,
    dry_run: bool,
}

impl ProcessRecoveryExecutor {
    pub fn new(interface: impl Into<String>, command_timeout: Duration, dry_run: bool) -> Self {
        Self { interface: interface.into(), command_timeout, dry_run }
    }

    fn refresh_dhcp(&self) -> bool {
        run_command(&["dhcpcd", "-n", &self.interface], self.command_timeout, self.dry_run).success
    }

    fn restart_network_services(&self, services: &[String]) -> bool {
        if services.is_empty() {
            return false;
        }
        services.iter().all(|svc| {
            run_command(&["systemctl", "restart", svc], self.command_timeout, self.dry_run).success
        })
    }

    fn cycle_interface(&self) -> bool {
        let down = run_command(&["ip", "link", "set", &self.interface, "down"], self.command_timeout, self.dry_run)
            .success;
        std::thread::sleep(Duration::from_secs(1));
        let up = run_command(&["ip", "link", "set", &self.interface, "up"], self.command_timeout, self.dry_run)
            .success;
        down && up
    }

    fn power_cycle_hub(&self, hub_port: &str) -> bool {
        let Some(tool) = which("uhubctl") else { return false };
        let tool = tool.to_string_lossy().into_owned();
        let off = run_command(&[&tool, "-l", hub_port, "-a", "off"], self.command_timeout, self.dry_run).success;
        std::thread::sleep(Duration::from_secs(2));
        let on = run_command(&[&tool, "-l", hub_port, "-a", "on"], self.command_timeout, self.dry_run).success;
        off && on
    }

    fn reboot(&self) -> bool {
        run_command(&["systemctl", "reboot"], self.command_timeout, self.dry_run).success
    }
}

impl RecoveryExecutor for ProcessRecoveryExecutor {
    fn invoke(&self, tier: &TierSpec) -> bool {
        match tier.name.as_str() {
            TIER_REFRESH_DHCP => self.refresh_dhcp(),
            TIER_RESTART_SERVICES => self.restart_network_services(&tier.services),
            TIER_CYCLE_INTERFACE => self.cycle_interface(),
            TIER_RESET_USB => match &tier.device_id {
                Some(id) => reset_usb(id, self.command_timeout, self.dry_run),
                None => false,
            },
            TIER_POWER_CYCLE_HUB => match &tier.hub_port {
                Some(port) => self.power_cycle_hub(port),
                None => false,
            },
            TIER_REBOOT => self.reboot(),
            other => {
                warn!(tier = other, "unknown recovery tier");
                false
            }
        }
    }
}
