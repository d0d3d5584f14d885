pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod latency;
pub mod server;
pub mod session;
pub mod synth;

pub use audio::{AudioFrame, AudioWaveform, CollectSink, FrameLayout, FrameSink, WavSink};
pub use config::Config;
pub use engine::{EngineSettings, ModelHandle, ModelLoader, SpeechModel, ToneLoader, WorkerLoader};
pub use error::{ModelLoadError, ProtocolError, SynthesisError, TransportError};
pub use latency::{spawn_monitor, LatencyMonitor, LatencyStats, TurnEvents, TurnState};
pub use server::{create_router, AppState};
pub use session::{SessionStats, UtteranceReport, VoiceSession, VoiceSessionConfig};
pub use synth::{FrameStream, LocalSynthesizer, RemoteSynthesizer, Synthesizer};
