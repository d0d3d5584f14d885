use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use super::model::{Device, GenerateRequest, InferenceParams, ModelLoader, Precision, SpeechModel};
use crate::audio::AudioWaveform;
use crate::error::{ModelLoadError, SynthesisError};

/// Startup-time settings for bringing up a model
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Model identifier tried first
    pub primary_model: String,
    /// Lower-fidelity model used if the primary cannot be brought up
    pub fallback_model: String,
    /// Target compute device
    pub device: Device,
    /// Sample rate the rest of the pipeline is framed for
    pub sample_rate: u32,
    /// Explicit inference knobs for every render
    pub params: InferenceParams,
    /// Run a warm-up generate after loading
    pub optimize: bool,
    /// Upper bound on a single render
    pub render_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            primary_model: "dicksonsarpong9/voxcpm_nigeria_accent".to_string(),
            fallback_model: "openbmb/VoxCPM-0.5B".to_string(),
            device: Device::Cpu,
            sample_rate: 24000,
            params: InferenceParams::default(),
            optimize: false,
            render_timeout: Duration::from_secs(60),
        }
    }
}

/// The process-wide loaded speech model
///
/// Cloning shares the same model. Renders are serialized through a mutex and
/// run on a blocking thread. The model is never replaced after load.
///
/// The lock is taken on the async side, inside the render timeout, so a
/// caller that gives up while queued never starts inference.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<Inner>,
}

struct Inner {
    model: Arc<Mutex<Box<dyn SpeechModel>>>,
    model_id: String,
    device: Device,
    sample_rate: u32,
    params: InferenceParams,
    render_timeout: Duration,
    is_fallback: bool,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model_id", &self.inner.model_id)
            .field("device", &self.inner.device)
            .field("sample_rate", &self.inner.sample_rate)
            .field("is_fallback", &self.inner.is_fallback)
            .finish()
    }
}

impl ModelHandle {
    /// Bring up the primary model, or the fallback if the primary fails.
    ///
    /// Blocking. Fails only when neither model can be constructed.
    pub fn load(
        loader: &dyn ModelLoader,
        settings: &EngineSettings,
    ) -> Result<Self, ModelLoadError> {
        info!(
            "Loading model {} on {} via {} loader",
            settings.primary_model,
            settings.device,
            loader.name()
        );

        let (model, model_id, is_fallback) =
            match bring_up(loader, &settings.primary_model, settings) {
                Ok(model) => (model, settings.primary_model.clone(), false),
                Err(primary_error) => {
                    error!("Failed to load model {}: {}", settings.primary_model, primary_error);
                    warn!("Falling back to model {}", settings.fallback_model);

                    match bring_up(loader, &settings.fallback_model, settings) {
                        Ok(model) => (model, settings.fallback_model.clone(), true),
                        Err(fallback_error) => {
                            error!(
                                "Failed to load fallback model {}: {}",
                                settings.fallback_model, fallback_error
                            );
                            return Err(ModelLoadError::FallbackExhausted {
                                primary: settings.primary_model.clone(),
                                primary_error: Box::new(primary_error),
                                fallback: settings.fallback_model.clone(),
                                fallback_error: Box::new(fallback_error),
                            });
                        }
                    }
                }
            };

        let mut model = model;
        if settings.optimize {
            warm_up(model.as_mut(), &model_id, settings.params);
        }

        info!(
            "Model {} ready on {} ({} Hz{})",
            model_id,
            settings.device,
            settings.sample_rate,
            if is_fallback { ", fallback" } else { "" }
        );

        Ok(Self {
            inner: Arc::new(Inner {
                model: Arc::new(Mutex::new(model)),
                model_id,
                device: settings.device,
                sample_rate: settings.sample_rate,
                params: settings.params,
                render_timeout: settings.render_timeout,
                is_fallback,
            }),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.inner.model_id
    }

    pub fn device(&self) -> Device {
        self.inner.device
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn is_fallback(&self) -> bool {
        self.inner.is_fallback
    }

    /// Render text to a mono PCM16 waveform.
    ///
    /// The timeout covers both waiting for the model and running it. A render
    /// already on the blocking thread when it fires still completes, holding
    /// the model lock, and its result is dropped.
    pub async fn render(&self, text: &str) -> Result<AudioWaveform, SynthesisError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let request = GenerateRequest::new(text, self.inner.params);
        let inner = Arc::clone(&self.inner);
        let task = async move {
            let model = Arc::clone(&inner.model).lock_owned().await;
            tokio::task::spawn_blocking(move || inner.render_blocking(model, &request)).await
        };

        match tokio::time::timeout(self.inner.render_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(SynthesisError::Inference(format!(
                "render task failed: {}",
                join_error
            ))),
            Err(_) => {
                warn!(
                    "Render exceeded {}s; result will be discarded",
                    self.inner.render_timeout.as_secs()
                );
                Err(SynthesisError::Timeout(self.inner.render_timeout.as_secs()))
            }
        }
    }
}

impl Inner {
    fn render_blocking(
        &self,
        mut model: OwnedMutexGuard<Box<dyn SpeechModel>>,
        request: &GenerateRequest,
    ) -> Result<AudioWaveform, SynthesisError> {
        let started = Instant::now();
        let raw = model
            .generate(request)
            .map_err(|e| SynthesisError::Inference(format!("{:#}", e)))?;

        if raw.samples.is_empty() {
            return Err(SynthesisError::Inference(
                "model returned an empty waveform".to_string(),
            ));
        }

        let waveform = raw.normalize(self.sample_rate);
        info!(
            latency_ms = started.elapsed().as_millis() as u64,
            samples = waveform.len(),
            "Rendered {:.2}s of audio",
            waveform.duration().as_secs_f64()
        );

        Ok(waveform)
    }
}

/// Materialize, fix precision, switch to inference mode, verify sample rate.
fn bring_up(
    loader: &dyn ModelLoader,
    model_id: &str,
    settings: &EngineSettings,
) -> Result<Box<dyn SpeechModel>, ModelLoadError> {
    let construct_error = |e: anyhow::Error| ModelLoadError::Construct {
        model_id: model_id.to_string(),
        reason: format!("{:#}", e),
    };

    let mut model = loader
        .materialize(model_id, settings.device)
        .map_err(construct_error)?;

    if settings.device.is_cpu() {
        model
            .set_precision(Precision::Float32)
            .map_err(construct_error)?;
    }

    model.set_inference_only().map_err(construct_error)?;

    let actual = model.sample_rate();
    if actual != settings.sample_rate {
        return Err(ModelLoadError::SampleRateMismatch {
            model_id: model_id.to_string(),
            expected: settings.sample_rate,
            actual,
        });
    }

    Ok(model)
}

/// Diagnostic only: failures are logged and swallowed.
fn warm_up(model: &mut dyn SpeechModel, model_id: &str, params: InferenceParams) {
    info!("Warming up model {}", model_id);
    let started = Instant::now();
    match model.generate(&GenerateRequest::warm_up(params)) {
        Ok(_) => info!(
            latency_ms = started.elapsed().as_millis() as u64,
            "Warm-up complete"
        ),
        Err(e) => warn!("Warm-up of {} failed: {:#}. Proceeding", model_id, e),
    }
}
