//! Voice-to-voice latency monitoring
//!
//! Observes user and agent turn-state transitions, which arrive independently
//! and in no particular order, and measures the gap between the user finishing
//! speaking and the agent starting to speak.
//!
//! [`spawn_monitor`] runs a [`LatencyMonitor`] as the single owner of the
//! pending timestamp; any number of [`TurnEvents`] clones feed it without
//! blocking.

mod monitor;
mod stats;
mod task;

pub use monitor::{LatencyMeasurement, LatencyMonitor, Role, TurnState, TurnTransition};
pub use stats::LatencyStats;
pub use task::{spawn_monitor, LatencyMonitorHandle, TurnEvents};
