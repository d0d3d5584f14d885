use serde::{Deserialize, Serialize};

/// Configuration for a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSessionConfig {
    /// Unique session identifier (e.g., "call-2025-10-28-0001")
    pub session_id: String,

    /// Silence played in place of an utterance that failed
    /// Default: 200 ms
    pub fallback_silence_ms: u32,
}

impl Default for VoiceSessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("voice-{}", uuid::Uuid::new_v4()),
            fallback_silence_ms: 200,
        }
    }
}
