use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::stats::LatencyStats;

/// Conversational state of one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    Idle,
    Listening,
    Speaking,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "idle"),
            TurnState::Listening => write!(f, "listening"),
            TurnState::Speaking => write!(f, "speaking"),
        }
    }
}

impl FromStr for TurnState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(TurnState::Idle),
            "listening" => Ok(TurnState::Listening),
            "speaking" => Ok(TurnState::Speaking),
            other => anyhow::bail!("unknown turn state '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One observed state change, stamped when it was reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTransition {
    pub role: Role,
    pub old: TurnState,
    pub new: TurnState,
    pub at: Instant,
}

impl TurnTransition {
    pub fn new(role: Role, old: TurnState, new: TurnState) -> Self {
        Self::at(role, old, new, Instant::now())
    }

    pub fn at(role: Role, old: TurnState, new: TurnState, at: Instant) -> Self {
        Self { role, old, new, at }
    }
}

/// Gap between the user finishing a turn and the agent starting to speak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyMeasurement {
    pub listening_at: Instant,
    pub speaking_at: Instant,
    pub latency: Duration,
}

impl LatencyMeasurement {
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_micros() as f64 / 1000.0
    }
}

/// Turn-state machine holding at most one unconsumed listening timestamp
#[derive(Debug, Default)]
pub struct LatencyMonitor {
    pending_listening: Option<Instant>,
    stats: LatencyStats,
}

impl LatencyMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transition, returning a measurement when one completes.
    ///
    /// A user `speaking -> listening` replaces any pending timestamp. An agent
    /// transition into `speaking` consumes it. Everything else is ignored.
    pub fn observe(&mut self, transition: &TurnTransition) -> Option<LatencyMeasurement> {
        match (transition.role, transition.old, transition.new) {
            (Role::User, TurnState::Speaking, TurnState::Listening) => {
                if self.pending_listening.is_some() {
                    debug!("Replacing unconsumed listening timestamp");
                }
                self.pending_listening = Some(transition.at);
                None
            }
            (Role::Agent, _, TurnState::Speaking) => {
                let listening_at = match self.pending_listening.take() {
                    Some(at) => at,
                    None => {
                        debug!("Agent started speaking with no pending user turn");
                        return None;
                    }
                };

                // Events stamped on different tasks can land slightly out of order
                let latency = transition.at.saturating_duration_since(listening_at);
                let measurement = LatencyMeasurement {
                    listening_at,
                    speaking_at: transition.at,
                    latency,
                };

                self.stats.record(measurement.latency_ms());
                info!(
                    latency_ms = measurement.latency_ms(),
                    "Voice-to-voice latency"
                );
                Some(measurement)
            }
            _ => None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending_listening.is_some()
    }

    pub fn stats(&self) -> &LatencyStats {
        &self.stats
    }

    pub fn into_stats(self) -> LatencyStats {
        self.stats
    }
}
