//! Persistent subprocess model back end
//!
//! The neural model lives in a long-running worker process that stays warm
//! between requests. Control protocol, one JSON object per line:
//!
//! - on spawn the worker prints `{"ok":true,"sample_rate":24000}`
//! - `{"op":"precision","dtype":"float32"}` / `{"op":"eval"}` answer `{"ok":true}`
//! - `{"op":"generate","text":..,"inference_timesteps":..,"cfg_value":..}`
//!   answers `{"ok":true,"samples":N,"channels":C,"dtype":"f32"|"i16"}`
//!   followed by `N * C` little-endian samples on stdout
//!
//! Any command may instead answer `{"error":"..."}`.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

use super::model::{Device, GenerateRequest, ModelLoader, Precision, SpeechModel};
use crate::audio::{RawWaveform, SampleBuffer};

/// Upper bound on one generate response, in samples
const MAX_RESPONSE_SAMPLES: usize = 24_000 * 600;

/// Spawns one worker process per materialized model
#[derive(Debug, Clone)]
pub struct WorkerLoader {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerLoader {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl ModelLoader for WorkerLoader {
    fn materialize(&self, model_id: &str, device: Device) -> Result<Box<dyn SpeechModel>> {
        if self.program.as_os_str().is_empty() {
            bail!(
                "Worker program is not configured. Set engine.worker_program in config \
                 or SIRIUS__ENGINE__WORKER_PROGRAM"
            );
        }

        info!(
            "Spawning model worker {} for {} on {}",
            self.program.display(),
            model_id,
            device
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--model")
            .arg(model_id)
            .arg("--device")
            .arg(device.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to spawn worker {:?}", self.program))?;

        let stdin = child.stdin.take().context("Failed to open worker stdin")?;
        let stdout = child.stdout.take().context("Failed to open worker stdout")?;

        let mut worker = WorkerModel {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            sample_rate: 0,
        };

        let ready = worker
            .read_reply()
            .with_context(|| format!("Worker failed to load {}", model_id))?;
        worker.sample_rate = ready
            .sample_rate
            .context("Worker ready line is missing sample_rate")?;

        debug!("Worker for {} ready at {} Hz", model_id, worker.sample_rate);

        Ok(Box::new(worker))
    }

    fn name(&self) -> &str {
        "worker"
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum WorkerCommand<'a> {
    Precision { dtype: Precision },
    Eval,
    Generate(&'a GenerateRequest),
}

#[derive(Debug, Deserialize)]
struct WorkerReply {
    #[serde(default)]
    ok: bool,
    error: Option<String>,
    sample_rate: Option<u32>,
    samples: Option<usize>,
    channels: Option<usize>,
    dtype: Option<String>,
}

struct WorkerModel {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    sample_rate: u32,
}

impl WorkerModel {
    fn send(&mut self, command: &WorkerCommand<'_>) -> Result<()> {
        let mut line = serde_json::to_vec(command)?;
        line.push(b'\n');
        self.stdin
            .write_all(&line)
            .and_then(|_| self.stdin.flush())
            .context("Failed to write to worker stdin")
    }

    fn read_reply(&mut self) -> Result<WorkerReply> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .context("Failed to read from worker stdout")?;
        if read == 0 {
            let status = self.child.try_wait().ok().flatten();
            bail!("worker exited unexpectedly (status: {:?})", status);
        }

        let reply: WorkerReply = serde_json::from_str(line.trim())
            .with_context(|| format!("Malformed worker reply: {}", line.trim()))?;

        if let Some(error) = reply.error {
            bail!("{}", error);
        }
        if !reply.ok {
            bail!("worker reply was not ok: {}", line.trim());
        }

        Ok(reply)
    }

    fn command(&mut self, command: &WorkerCommand<'_>) -> Result<WorkerReply> {
        self.send(command)?;
        self.read_reply()
    }

    fn read_samples(&mut self, reply: &WorkerReply) -> Result<RawWaveform> {
        let samples = reply.samples.context("generate reply is missing samples")?;
        let channels = reply.channels.unwrap_or(1).max(1);
        let total = samples
            .checked_mul(channels)
            .filter(|&n| n <= MAX_RESPONSE_SAMPLES)
            .with_context(|| format!("worker response too large: {} x {}", samples, channels))?;

        let buffer = match reply.dtype.as_deref().unwrap_or("f32") {
            "f32" => {
                let mut bytes = vec![0u8; total * 4];
                self.stdout
                    .read_exact(&mut bytes)
                    .context("Truncated f32 audio from worker")?;
                SampleBuffer::F32(
                    bytes
                        .chunks_exact(4)
                        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                        .collect(),
                )
            }
            "i16" => {
                let mut bytes = vec![0u8; total * 2];
                self.stdout
                    .read_exact(&mut bytes)
                    .context("Truncated i16 audio from worker")?;
                SampleBuffer::I16(
                    bytes
                        .chunks_exact(2)
                        .map(|b| i16::from_le_bytes([b[0], b[1]]))
                        .collect(),
                )
            }
            other => bail!("unsupported worker dtype '{}'", other),
        };

        Ok(RawWaveform {
            samples: buffer,
            channels,
        })
    }
}

impl SpeechModel for WorkerModel {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_precision(&mut self, precision: Precision) -> Result<()> {
        self.command(&WorkerCommand::Precision { dtype: precision })
            .map(|_| ())
            .with_context(|| format!("Worker rejected precision {}", precision))
    }

    fn set_inference_only(&mut self) -> Result<()> {
        self.command(&WorkerCommand::Eval)
            .map(|_| ())
            .context("Worker rejected inference mode")
    }

    fn generate(&mut self, request: &GenerateRequest) -> Result<RawWaveform> {
        let reply = self.command(&WorkerCommand::Generate(request))?;
        self.read_samples(&reply)
    }
}

impl Drop for WorkerModel {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!("Failed to stop model worker: {}", e);
        }
        let _ = self.child.wait();
    }
}
