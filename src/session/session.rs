use super::config::VoiceSessionConfig;
use super::stats::{SessionStats, UtteranceReport};
use crate::audio::{AudioFrame, FrameSink};
use crate::latency::{TurnEvents, TurnState};
use crate::synth::Synthesizer;
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Plays agent utterances into a frame sink, one at a time
pub struct VoiceSession<K: FrameSink> {
    /// Session configuration
    config: VoiceSessionConfig,

    /// Produces frames for each utterance
    synthesizer: Arc<dyn Synthesizer>,

    /// Realtime transport boundary
    sink: K,

    /// Latency monitor input, if one is attached
    turns: Option<TurnEvents>,

    /// Agent turn state as last reported
    agent_state: TurnState,

    /// When the session started
    started_at: chrono::DateTime<chrono::Utc>,

    utterances: usize,
    failed_utterances: usize,
    frames_sent: usize,
    samples_sent: usize,
}

impl<K: FrameSink> VoiceSession<K> {
    pub fn new(config: VoiceSessionConfig, synthesizer: Arc<dyn Synthesizer>, sink: K) -> Self {
        info!(
            "Creating voice session {} ({} synthesizer, {} sink)",
            config.session_id,
            synthesizer.name(),
            sink.name()
        );

        Self {
            config,
            synthesizer,
            sink,
            turns: None,
            agent_state: TurnState::Listening,
            started_at: Utc::now(),
            utterances: 0,
            failed_utterances: 0,
            frames_sent: 0,
            samples_sent: 0,
        }
    }

    /// Report agent turn changes to a latency monitor
    pub fn with_turn_events(mut self, turns: TurnEvents) -> Self {
        self.turns = Some(turns);
        self
    }

    /// Speak one utterance.
    ///
    /// Synthesis failures never end the session: text rejected up front
    /// produces no audio, and a failure after the lead-in is padded with a
    /// short silence. Only a sink failure is returned as an error. The agent
    /// is back to listening when this returns, whatever the outcome.
    pub async fn speak(&mut self, text: &str) -> Result<UtteranceReport> {
        let result = self.play(text).await;
        self.set_agent_state(TurnState::Listening);
        result
    }

    async fn play(&mut self, text: &str) -> Result<UtteranceReport> {
        self.utterances += 1;
        let requested = Instant::now();
        let mut report = UtteranceReport {
            frames: 0,
            samples: 0,
            first_audio_ms: None,
            error: None,
        };

        let mut stream = match self.synthesizer.synthesize(text).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Skipping utterance in {}: {}", self.config.session_id, e);
                self.failed_utterances += 1;
                report.error = Some(e.to_string());
                return Ok(report);
            }
        };

        while let Some(item) = stream.next_frame().await {
            match item {
                Ok(frame) => {
                    if report.frames == 0 {
                        self.set_agent_state(TurnState::Speaking);
                    } else if report.first_audio_ms.is_none() {
                        report.first_audio_ms = Some(requested.elapsed().as_millis() as u64);
                    }
                    self.push(frame, &mut report).await?;
                }
                Err(e) => {
                    warn!(
                        "Utterance failed in {} after {} frames: {}",
                        self.config.session_id, report.frames, e
                    );
                    report.error = Some(e.to_string());
                    break;
                }
            }
        }

        if report.error.is_some() {
            self.failed_utterances += 1;
            self.set_agent_state(TurnState::Speaking);
            let silence = AudioFrame::silence(
                self.synthesizer.layout().sample_rate,
                self.config.fallback_silence_ms,
            );
            self.push(silence, &mut report).await?;
        }

        Ok(report)
    }

    /// Report that the user's turn state changed
    pub fn user_state_changed(&self, old: TurnState, new: TurnState) {
        if let Some(turns) = &self.turns {
            turns.user_state_changed(old, new);
        }
    }

    pub fn stats(&self) -> SessionStats {
        let sample_rate = self.synthesizer.layout().sample_rate.max(1);
        SessionStats {
            session_id: self.config.session_id.clone(),
            started_at: self.started_at,
            utterances: self.utterances,
            failed_utterances: self.failed_utterances,
            frames_sent: self.frames_sent,
            audio_secs: self.samples_sent as f64 / sample_rate as f64,
        }
    }

    /// Flush the sink and hand it back with the final statistics
    pub async fn finish(mut self) -> Result<(K, SessionStats)> {
        self.sink
            .flush()
            .await
            .with_context(|| format!("Failed to flush {} sink", self.sink.name()))?;

        let stats = self.stats();
        info!(
            "Voice session {} finished: {} utterances ({} failed), {:.2}s of audio",
            stats.session_id, stats.utterances, stats.failed_utterances, stats.audio_secs
        );
        Ok((self.sink, stats))
    }

    async fn push(&mut self, frame: AudioFrame, report: &mut UtteranceReport) -> Result<()> {
        let samples = frame.sample_count();
        self.sink
            .push(frame)
            .await
            .with_context(|| format!("Failed to push frame to {} sink", self.sink.name()))?;

        report.frames += 1;
        report.samples += samples;
        self.frames_sent += 1;
        self.samples_sent += samples;
        Ok(())
    }

    fn set_agent_state(&mut self, new: TurnState) {
        if self.agent_state == new {
            return;
        }
        let old = std::mem::replace(&mut self.agent_state, new);
        if let Some(turns) = &self.turns {
            turns.agent_state_changed(old, new);
        }
    }
}
