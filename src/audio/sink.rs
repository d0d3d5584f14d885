use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::frame::AudioFrame;

/// Consumer of agent audio frames (the realtime transport boundary)
///
/// Frames are pushed strictly in order; a sink never reorders them.
#[async_trait::async_trait]
pub trait FrameSink: Send {
    /// Accept the next frame of the current utterance
    async fn push(&mut self, frame: AudioFrame) -> Result<()>;

    /// Flush anything buffered
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Get sink name for logging
    fn name(&self) -> &str;
}

/// Keeps every frame in memory
#[derive(Debug, Default)]
pub struct CollectSink {
    pub frames: Vec<AudioFrame>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_count(&self) -> usize {
        self.frames.iter().map(|f| f.sample_count()).sum()
    }
}

#[async_trait::async_trait]
impl FrameSink for CollectSink {
    async fn push(&mut self, frame: AudioFrame) -> Result<()> {
        self.frames.push(frame);
        Ok(())
    }

    fn name(&self) -> &str {
        "collect"
    }
}

/// Writes frames to a mono 16-bit WAV file
pub struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    path: PathBuf,
    sample_rate: u32,
    sample_count: usize,
}

impl WavSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer: Some(writer),
            path,
            sample_rate,
            sample_count: 0,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Finalize the WAV header and return the file path
    pub fn finish(mut self) -> Result<PathBuf> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }

        info!(
            "Wrote {} samples ({:.2}s) to {}",
            self.sample_count,
            self.sample_count as f64 / self.sample_rate.max(1) as f64,
            self.path.display()
        );

        Ok(self.path.clone())
    }
}

#[async_trait::async_trait]
impl FrameSink for WavSink {
    async fn push(&mut self, frame: AudioFrame) -> Result<()> {
        if frame.sample_rate() != self.sample_rate {
            anyhow::bail!(
                "frame sample rate {} Hz does not match WAV sample rate {} Hz",
                frame.sample_rate(),
                self.sample_rate
            );
        }

        if let Some(writer) = &mut self.writer {
            for sample in frame.samples() {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            self.sample_count += frame.sample_count();
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            writer.flush().context("Failed to flush WAV file")?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "wav"
    }
}

impl Drop for WavSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
