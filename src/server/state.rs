use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::engine::ModelHandle;

/// Shared application state for connection handlers
#[derive(Clone)]
pub struct AppState {
    /// The one warm model, shared by every connection
    pub model: ModelHandle,

    /// Request/connection counters
    pub stats: Arc<ServerStats>,

    /// Largest accepted utterance text, in bytes
    pub max_text_bytes: usize,
}

impl AppState {
    pub fn new(model: ModelHandle, max_text_bytes: usize) -> Self {
        Self {
            model,
            stats: Arc::new(ServerStats::new()),
            max_text_bytes,
        }
    }
}

/// Live counters for the server
#[derive(Debug)]
pub struct ServerStats {
    started_at: DateTime<Utc>,
    connections_total: AtomicUsize,
    connections_active: AtomicUsize,
    requests_total: AtomicUsize,
    requests_failed: AtomicUsize,
    audio_bytes_sent: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            connections_total: AtomicUsize::new(0),
            connections_active: AtomicUsize::new(0),
            requests_total: AtomicUsize::new(0),
            requests_failed: AtomicUsize::new(0),
            audio_bytes_sent: AtomicU64::new(0),
        }
    }

    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::SeqCst);
        self.connections_active.fetch_add(1, Ordering::SeqCst);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn request_served(&self, bytes: usize) {
        self.requests_total.fetch_add(1, Ordering::SeqCst);
        self.audio_bytes_sent.fetch_add(bytes as u64, Ordering::SeqCst);
    }

    pub fn request_failed(&self) {
        self.requests_total.fetch_add(1, Ordering::SeqCst);
        self.requests_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self, model: &ModelHandle) -> StatsSnapshot {
        let uptime = Utc::now().signed_duration_since(self.started_at);

        StatsSnapshot {
            model_id: model.model_id().to_string(),
            fallback_model: model.is_fallback(),
            device: model.device().to_string(),
            sample_rate: model.sample_rate(),
            started_at: self.started_at,
            uptime_secs: uptime.num_milliseconds() as f64 / 1000.0,
            connections_total: self.connections_total.load(Ordering::SeqCst),
            connections_active: self.connections_active.load(Ordering::SeqCst),
            requests_total: self.requests_total.load(Ordering::SeqCst),
            requests_failed: self.requests_failed.load(Ordering::SeqCst),
            audio_bytes_sent: self.audio_bytes_sent.load(Ordering::SeqCst),
        }
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the running server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Model actually serving requests
    pub model_id: String,

    /// Whether the fallback model was loaded
    pub fallback_model: bool,

    /// Compute device
    pub device: String,

    /// Output sample rate in Hz
    pub sample_rate: u32,

    /// When the server started
    pub started_at: DateTime<Utc>,

    /// Seconds since start
    pub uptime_secs: f64,

    pub connections_total: usize,
    pub connections_active: usize,
    pub requests_total: usize,
    pub requests_failed: usize,

    /// Total PCM bytes returned to clients
    pub audio_bytes_sent: u64,
}
