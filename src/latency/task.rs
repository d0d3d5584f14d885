use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::monitor::{LatencyMeasurement, LatencyMonitor, Role, TurnState, TurnTransition};
use super::stats::LatencyStats;

const MEASUREMENT_CAPACITY: usize = 16;

#[derive(Debug)]
enum MonitorEvent {
    Transition(TurnTransition),
    Stop,
}

/// Cloneable, non-blocking reporter for turn-state changes
///
/// Each call stamps the transition with the time it was made, so callbacks
/// from different tasks can report without coordinating.
#[derive(Debug, Clone)]
pub struct TurnEvents {
    tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl TurnEvents {
    pub fn user_state_changed(&self, old: TurnState, new: TurnState) {
        self.report(TurnTransition::new(Role::User, old, new));
    }

    pub fn agent_state_changed(&self, old: TurnState, new: TurnState) {
        self.report(TurnTransition::new(Role::Agent, old, new));
    }

    /// Report a transition that was stamped elsewhere
    pub fn report(&self, transition: TurnTransition) {
        if self.tx.send(MonitorEvent::Transition(transition)).is_err() {
            debug!("Latency monitor stopped; dropping {:?}", transition);
        }
    }
}

/// Owner of a running monitor task
pub struct LatencyMonitorHandle {
    events: TurnEvents,
    measurements: broadcast::Sender<LatencyMeasurement>,
    task: JoinHandle<LatencyStats>,
}

impl LatencyMonitorHandle {
    pub fn events(&self) -> TurnEvents {
        self.events.clone()
    }

    /// Receive each measurement as it is made
    pub fn subscribe(&self) -> broadcast::Receiver<LatencyMeasurement> {
        self.measurements.subscribe()
    }

    /// Stop after processing everything reported so far and return the summary.
    pub async fn shutdown(self) -> Result<LatencyStats> {
        let _ = self.events.tx.send(MonitorEvent::Stop);
        self.task.await.context("Latency monitor task failed")
    }
}

/// Spawn the single task that owns the monitor state
pub fn spawn_monitor() -> LatencyMonitorHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (measurements, _) = broadcast::channel(MEASUREMENT_CAPACITY);
    let publisher = measurements.clone();

    let task = tokio::spawn(async move {
        let mut monitor = LatencyMonitor::new();

        while let Some(event) = rx.recv().await {
            match event {
                MonitorEvent::Transition(transition) => {
                    if let Some(measurement) = monitor.observe(&transition) {
                        // No subscribers is fine
                        let _ = publisher.send(measurement);
                    }
                }
                MonitorEvent::Stop => break,
            }
        }

        let stats = monitor.into_stats();
        if let Some(mean) = stats.mean_ms() {
            info!(
                count = stats.count,
                mean_ms = mean,
                "Latency monitor stopped"
            );
        }
        stats
    });

    LatencyMonitorHandle {
        events: TurnEvents { tx },
        measurements,
        task,
    }
}
