use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::audio::RawWaveform;

/// Compute device a model is materialized on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    /// Pick CUDA when a GPU is visible, otherwise CPU
    pub fn detect() -> Self {
        let visible = std::env::var("CUDA_VISIBLE_DEVICES")
            .map(|v| {
                let v = v.trim();
                !v.is_empty() && v != "-1" && v != "none"
            })
            .unwrap_or(false);

        if visible || Path::new("/dev/nvidia0").exists() {
            Device::Cuda
        } else {
            Device::Cpu
        }
    }

    /// CPU-class devices must run at full precision
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda => f.write_str("cuda"),
        }
    }
}

/// Device selection as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSetting {
    Auto,
    Cpu,
    Cuda,
}

impl DeviceSetting {
    pub fn resolve(self) -> Device {
        match self {
            DeviceSetting::Auto => Device::detect(),
            DeviceSetting::Cpu => Device::Cpu,
            DeviceSetting::Cuda => Device::Cuda,
        }
    }
}

impl FromStr for DeviceSetting {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DeviceSetting::Auto),
            "cpu" => Ok(DeviceSetting::Cpu),
            "cuda" | "gpu" => Ok(DeviceSetting::Cuda),
            other => anyhow::bail!("unknown device '{}' (expected auto, cpu or cuda)", other),
        }
    }
}

/// Numeric precision of model weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Float32,
    Bfloat16,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Float32 => f.write_str("float32"),
            Precision::Bfloat16 => f.write_str("bfloat16"),
        }
    }
}

/// Explicit inference knobs
///
/// Model defaults are too slow for interactive use, so every render passes
/// these values instead of relying on them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    /// Diffusion steps per utterance
    pub inference_steps: u32,
    /// Classifier-free guidance strength
    pub guidance: f32,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            inference_steps: 6,
            guidance: 1.5,
        }
    }
}

/// One generate call against a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub text: String,
    pub inference_timesteps: u32,
    pub cfg_value: f32,
    pub normalize: bool,
    pub denoise: bool,
    pub retry_badcase: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
}

impl GenerateRequest {
    pub fn new(text: impl Into<String>, params: InferenceParams) -> Self {
        Self {
            text: text.into(),
            inference_timesteps: params.inference_steps,
            cfg_value: params.guidance,
            normalize: false,
            denoise: false,
            retry_badcase: false,
            max_len: None,
        }
    }

    /// Short throwaway call used to surface device/kernel errors
    pub fn warm_up(params: InferenceParams) -> Self {
        Self {
            max_len: Some(5),
            ..Self::new("Warmup", params)
        }
    }
}

/// A loaded speech-synthesis model
///
/// Calls are blocking; the host runs them on a blocking thread and never
/// issues two calls at once.
pub trait SpeechModel: Send {
    /// Native output sample rate
    fn sample_rate(&self) -> u32;

    /// Set weight precision
    fn set_precision(&mut self, precision: Precision) -> Result<()>;

    /// Disable gradient tracking and training-time stochastic layers
    fn set_inference_only(&mut self) -> Result<()>;

    /// Render text to a raw waveform
    fn generate(&mut self, request: &GenerateRequest) -> Result<RawWaveform>;
}

/// Materializes model identifiers on a device
pub trait ModelLoader: Send + Sync {
    fn materialize(&self, model_id: &str, device: Device) -> Result<Box<dyn SpeechModel>>;

    /// Get loader name for logging
    fn name(&self) -> &str;
}
