//! Client-side audio framing adapter
//!
//! Turns text into an ordered [`FrameStream`] for the realtime transport:
//! a 20 ms lead-in silence frame first, then the utterance in 50 ms frames.
//! Two variants share that contract: [`LocalSynthesizer`] calls the model in
//! process, [`RemoteSynthesizer`] asks the streaming transport server.

mod local;
mod remote;

pub use local::LocalSynthesizer;
pub use remote::RemoteSynthesizer;

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::audio::{AudioFrame, AudioWaveform, FrameLayout};
use crate::error::SynthesisError;

/// Frames buffered ahead of the consumer
const FRAME_BUFFER: usize = 64;

pub type FrameResult = Result<AudioFrame, SynthesisError>;

/// Text-to-frames synthesizer
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// Start one utterance
    ///
    /// Empty or oversized text is rejected here, before any frame is produced.
    /// Otherwise the stream yields the lead-in silence, the audio frames in
    /// order, and, on failure, one final `Err` after whatever was emitted.
    async fn synthesize(&self, text: &str) -> Result<FrameStream, SynthesisError>;

    /// Frame sizing used for every utterance
    fn layout(&self) -> FrameLayout;

    /// Get synthesizer name for logging
    fn name(&self) -> &str;
}

/// Ordered frames of one utterance; finite and consumed once
#[derive(Debug)]
pub struct FrameStream {
    rx: mpsc::Receiver<FrameResult>,
}

impl FrameStream {
    pub async fn next_frame(&mut self) -> Option<FrameResult> {
        self.rx.recv().await
    }

    /// Drain the stream, returning every frame emitted and the failure, if any
    pub async fn collect_all(mut self) -> (Vec<AudioFrame>, Option<SynthesisError>) {
        let mut frames = Vec::new();
        while let Some(item) = self.rx.recv().await {
            match item {
                Ok(frame) => frames.push(frame),
                Err(e) => return (frames, Some(e)),
            }
        }
        (frames, None)
    }
}

impl Stream for FrameStream {
    type Item = FrameResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Trim and bound utterance text
pub(crate) fn validate_text(text: &str, max_text_bytes: usize) -> Result<String, SynthesisError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SynthesisError::EmptyText);
    }
    if text.len() > max_text_bytes {
        return Err(SynthesisError::TextTooLong {
            len: text.len(),
            limit: max_text_bytes,
        });
    }
    Ok(text.to_string())
}

/// Runs utterances one at a time and frames their audio
///
/// The gate is held from the lead-in frame until the last frame is queued,
/// so two utterances on the same synthesizer never interleave.
#[derive(Debug, Clone)]
pub(crate) struct UtteranceDriver {
    layout: FrameLayout,
    gate: Arc<Mutex<()>>,
}

impl UtteranceDriver {
    pub(crate) fn new(layout: FrameLayout) -> Self {
        Self {
            layout,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub(crate) fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Spawn the utterance task. Dropping the returned stream cancels it.
    pub(crate) fn start<F>(&self, fetch: F) -> FrameStream
    where
        F: Future<Output = Result<AudioWaveform, SynthesisError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let gate = Arc::clone(&self.gate);
        let layout = self.layout;

        tokio::spawn(async move {
            let _turn = gate.lock_owned().await;

            if tx.send(Ok(layout.lead_in())).await.is_err() {
                return;
            }

            let waveform = tokio::select! {
                result = fetch => result,
                _ = tx.closed() => {
                    debug!("Utterance cancelled before audio was ready");
                    return;
                }
            };

            match waveform {
                Ok(waveform) => {
                    let total = waveform.len();
                    for frame in layout.frames(waveform) {
                        if tx.send(Ok(frame)).await.is_err() {
                            debug!("Utterance cancelled during playback");
                            return;
                        }
                    }
                    debug!("Queued {} samples in {} ms frames", total, layout.frame_ms);
                }
                Err(e) => {
                    warn!("TTS synthesis failed: {}", e);
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        FrameStream { rx }
    }
}
