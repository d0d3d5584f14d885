use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one spoken utterance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtteranceReport {
    /// Frames handed to the sink, including the lead-in and any fallback silence
    pub frames: usize,

    /// Samples handed to the sink
    pub samples: usize,

    /// Milliseconds from the request to the first frame with audio
    pub first_audio_ms: Option<u64>,

    /// Why the utterance failed, if it did
    pub error: Option<String>,
}

impl UtteranceReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Statistics about a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Utterances attempted
    pub utterances: usize,

    /// Utterances that degraded to silence
    pub failed_utterances: usize,

    /// Frames handed to the sink
    pub frames_sent: usize,

    /// Seconds of audio handed to the sink
    pub audio_secs: f64,
}
