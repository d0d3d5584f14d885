//! Voice session
//!
//! `VoiceSession` plays agent utterances into the realtime transport:
//! - streams each utterance's frames into a [`FrameSink`](crate::audio::FrameSink) in order
//! - reports agent turn-state changes to the latency monitor
//! - degrades a failed utterance to a short silence instead of ending the session

mod config;
mod session;
mod stats;

pub use config::VoiceSessionConfig;
pub use session::VoiceSession;
pub use stats::{SessionStats, UtteranceReport};
