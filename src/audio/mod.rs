pub mod frame;
pub mod sink;
pub mod waveform;

pub use frame::{AudioFrame, FrameIter, FrameLayout, DEFAULT_FRAME_MS, DEFAULT_LEAD_IN_MS};
pub use sink::{CollectSink, FrameSink, WavSink};
pub use waveform::{AudioWaveform, RawWaveform, SampleBuffer};
