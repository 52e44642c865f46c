//! linkwatchd — network-link watchdog daemon.
//!
//! Wires the probe, classifier, escalation, recovery, persistence, and status
//! crates into a single supervised cycle loop.

pub mod adaptive;
pub mod cycle;
pub mod error;

pub use error::{SupervisorError, SupervisorResult};
