use serde::{Deserialize, Serialize};

/// Running summary of voice-to-voice latency, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Number of measurements recorded
    pub count: u64,

    /// Most recent measurement
    pub last_ms: Option<f64>,

    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,

    /// Sum of all measurements
    pub total_ms: f64,
}

impl LatencyStats {
    pub fn record(&mut self, latency_ms: f64) {
        self.count += 1;
        self.total_ms += latency_ms;
        self.last_ms = Some(latency_ms);
        self.min_ms = Some(self.min_ms.map_or(latency_ms, |m| m.min(latency_ms)));
        self.max_ms = Some(self.max_ms.map_or(latency_ms, |m| m.max(latency_ms)));
    }

    pub fn mean_ms(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.total_ms / self.count as f64)
    }
}
