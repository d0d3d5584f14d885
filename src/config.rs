use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::FrameLayout;
use crate::engine::{DeviceSetting, EngineSettings, InferenceParams};

/// Environment prefix; `SIRIUS__ENGINE__DEVICE=cpu` overrides `engine.device`
pub const ENV_PREFIX: &str = "SIRIUS";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub client: ClientConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_text_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Worker,
    Tone,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub backend: Backend,
    pub primary_model: String,
    pub fallback_model: String,
    pub device: DeviceSetting,
    pub sample_rate: u32,
    pub inference_steps: u32,
    pub guidance: f32,
    pub optimize: bool,
    pub render_timeout_secs: u64,
    pub worker_program: PathBuf,
    pub worker_args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub frame_ms: u32,
    pub lead_in_ms: u32,
}

impl Config {
    /// Load defaults, then the optional config file at `path`, then `SIRIUS__*` variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(" ")
                    .with_list_parse_key("engine.worker_args")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path))?;

        let cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("server.bind", "0.0.0.0")?
            .set_default("server.port", 9001)?
            .set_default("server.max_text_bytes", 64 * 1024)?
            .set_default("engine.backend", "worker")?
            .set_default("engine.primary_model", "dicksonsarpong9/voxcpm_nigeria_accent")?
            .set_default("engine.fallback_model", "openbmb/VoxCPM-0.5B")?
            .set_default("engine.device", "auto")?
            .set_default("engine.sample_rate", 24000)?
            .set_default("engine.inference_steps", 6)?
            .set_default("engine.guidance", 1.5)?
            .set_default("engine.optimize", false)?
            .set_default("engine.render_timeout_secs", 60)?
            .set_default("engine.worker_program", "")?
            .set_default("engine.worker_args", Vec::<String>::new())?
            .set_default("client.url", "ws://127.0.0.1:9001")?
            .set_default("client.connect_timeout_secs", 5)?
            .set_default("client.request_timeout_secs", 60)?
            .set_default("audio.frame_ms", 50)?
            .set_default("audio.lead_in_ms", 20)?)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.sample_rate == 0 {
            anyhow::bail!("engine.sample_rate must be positive");
        }
        if self.audio.frame_ms == 0 {
            anyhow::bail!("audio.frame_ms must be positive");
        }
        if self.engine.inference_steps == 0 {
            anyhow::bail!("engine.inference_steps must be positive");
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            primary_model: self.engine.primary_model.clone(),
            fallback_model: self.engine.fallback_model.clone(),
            device: self.engine.device.resolve(),
            sample_rate: self.engine.sample_rate,
            params: InferenceParams {
                inference_steps: self.engine.inference_steps,
                guidance: self.engine.guidance,
            },
            optimize: self.engine.optimize,
            render_timeout: Duration::from_secs(self.engine.render_timeout_secs),
        }
    }

    pub fn frame_layout(&self) -> FrameLayout {
        FrameLayout {
            sample_rate: self.engine.sample_rate,
            frame_ms: self.audio.frame_ms,
            lead_in_ms: self.audio.lead_in_ms,
        }
    }
}
