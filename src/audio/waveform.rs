use std::time::Duration;

/// Sample storage as produced by a speech model, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I16(Vec<i16>),
}

impl SampleBuffer {
    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::F32(s) => s.len(),
            SampleBuffer::F64(s) => s.len(),
            SampleBuffer::I16(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raw model output: interleaved samples with an arbitrary channel count.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWaveform {
    pub samples: SampleBuffer,
    pub channels: usize,
}

impl RawWaveform {
    pub fn mono(samples: SampleBuffer) -> Self {
        Self {
            samples,
            channels: 1,
        }
    }

    /// Collapse to one channel, bound float peaks to unity and cast to 16-bit PCM.
    ///
    /// Float output is only rescaled when its peak exceeds 1.0; already-bounded
    /// audio keeps its gain. Integer output passes through untouched.
    pub fn normalize(self, sample_rate: u32) -> AudioWaveform {
        let channels = self.channels.max(1);

        let samples = match self.samples {
            SampleBuffer::I16(s) => downmix_i16(s, channels),
            SampleBuffer::F32(s) => {
                let mono = downmix_f64(s.into_iter().map(f64::from), channels);
                float_to_pcm16(mono)
            }
            SampleBuffer::F64(s) => {
                let mono = downmix_f64(s.into_iter(), channels);
                float_to_pcm16(mono)
            }
        };

        AudioWaveform::new(samples, sample_rate)
    }
}

fn downmix_i16(samples: Vec<i16>, channels: usize) -> Vec<i16> {
    if channels == 1 {
        return samples;
    }

    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

fn downmix_f64(samples: impl Iterator<Item = f64>, channels: usize) -> Vec<f64> {
    let samples: Vec<f64> = samples.collect();
    if channels == 1 {
        return samples;
    }

    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect()
}

/// Peak absolute amplitude, ignoring NaN.
pub fn peak_amplitude(samples: &[f64]) -> f64 {
    samples
        .iter()
        .filter(|s| !s.is_nan())
        .fold(0.0_f64, |peak, s| peak.max(s.abs()))
}

fn float_to_pcm16(mut samples: Vec<f64>) -> Vec<i16> {
    let peak = peak_amplitude(&samples);
    if peak > 1.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }

    // `as` saturates and maps NaN to zero
    samples
        .into_iter()
        .map(|s| (s * i16::MAX as f64) as i16)
        .collect()
}

/// One utterance of mono 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioWaveform {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioWaveform {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decode little-endian PCM16 bytes. Returns `None` on an odd byte count.
    pub fn from_pcm16_bytes(bytes: &[u8], sample_rate: u32) -> Option<Self> {
        if bytes.len() % 2 != 0 {
            return None;
        }

        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Some(Self::new(samples, sample_rate))
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    pub fn to_pcm16_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}
