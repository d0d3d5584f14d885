//! Speech-synthesis model host
//!
//! Owns the single loaded model for the process:
//! - primary/fallback bring-up with CPU precision fix and inference mode
//! - optional diagnostic warm-up
//! - serialized, timeout-bounded rendering to PCM16 waveforms
//!
//! Model back ends plug in through [`ModelLoader`].

mod host;
mod model;
mod tone;
mod worker;

pub use host::{EngineSettings, ModelHandle};
pub use model::{
    Device, DeviceSetting, GenerateRequest, InferenceParams, ModelLoader, Precision, SpeechModel,
};
pub use tone::ToneLoader;
pub use worker::WorkerLoader;
