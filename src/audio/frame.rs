use super::waveform::AudioWaveform;
use std::time::Duration;

/// Nominal frame duration handed to the realtime transport
pub const DEFAULT_FRAME_MS: u32 = 50;

/// Duration of the silence frame emitted before any synthesized audio
pub const DEFAULT_LEAD_IN_MS: u32 = 20;

/// One immutable slice of mono PCM16 audio
///
/// `sample_count` always equals `pcm16_bytes.len() / 2`; the constructors
/// are the only way to build a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Raw audio bytes (i16 PCM, little-endian)
    data: Vec<u8>,
    /// Sample rate in Hz
    sample_rate: u32,
    /// Number of channels (always 1)
    channels: u16,
}

impl AudioFrame {
    pub fn from_samples(samples: &[i16], sample_rate: u32) -> Self {
        Self {
            data: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
            sample_rate,
            channels: 1,
        }
    }

    /// Returns `None` if the byte count is odd.
    pub fn from_pcm16_bytes(data: Vec<u8>, sample_rate: u32) -> Option<Self> {
        if data.len() % 2 != 0 {
            return None;
        }
        Some(Self {
            data,
            sample_rate,
            channels: 1,
        })
    }

    /// A frame of zero-valued samples.
    pub fn silence(sample_rate: u32, duration_ms: u32) -> Self {
        let samples = samples_for(sample_rate, duration_ms);
        Self {
            data: vec![0u8; samples * 2],
            sample_rate,
            channels: 1,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_count(&self) -> usize {
        self.data.len() / 2
    }

    pub fn pcm16_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    pub fn is_silent(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.sample_count() as f64 / self.sample_rate as f64)
    }
}

fn samples_for(sample_rate: u32, duration_ms: u32) -> usize {
    (sample_rate as u64 * duration_ms as u64 / 1000) as usize
}

/// Frame sizing for one sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Nominal duration of each audio frame
    pub frame_ms: u32,
    /// Duration of the lead-in silence frame
    pub lead_in_ms: u32,
}

impl FrameLayout {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frame_ms: DEFAULT_FRAME_MS,
            lead_in_ms: DEFAULT_LEAD_IN_MS,
        }
    }

    /// Samples per full frame (1200 at 24 kHz / 50 ms).
    pub fn frame_samples(&self) -> usize {
        samples_for(self.sample_rate, self.frame_ms).max(1)
    }

    pub fn lead_in(&self) -> AudioFrame {
        AudioFrame::silence(self.sample_rate, self.lead_in_ms)
    }

    /// Slice a waveform into ordered frames. The last frame may be short.
    pub fn frames(&self, waveform: AudioWaveform) -> FrameIter {
        FrameIter {
            samples: waveform.into_samples(),
            position: 0,
            frame_samples: self.frame_samples(),
            sample_rate: self.sample_rate,
        }
    }
}

/// Lazy, single-pass iterator over the frames of one utterance
#[derive(Debug)]
pub struct FrameIter {
    samples: Vec<i16>,
    position: usize,
    frame_samples: usize,
    sample_rate: u32,
}

impl Iterator for FrameIter {
    type Item = AudioFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.samples.len() {
            return None;
        }

        let end = (self.position + self.frame_samples).min(self.samples.len());
        let frame = AudioFrame::from_samples(&self.samples[self.position..end], self.sample_rate);
        self.position = end;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.samples.len().saturating_sub(self.position);
        let frames = remaining.div_ceil(self.frame_samples);
        (frames, Some(frames))
    }
}

impl ExactSizeIterator for FrameIter {}
