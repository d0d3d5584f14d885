// Shared fixtures for integration tests: a scriptable speech model and a
// server harness bound to an ephemeral port.

#![allow(dead_code)]

use anyhow::{bail, Result};
use sirius_voice::audio::{RawWaveform, SampleBuffer};
use sirius_voice::engine::{
    Device, EngineSettings, GenerateRequest, ModelHandle, ModelLoader, Precision, SpeechModel,
};
use sirius_voice::server::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub const PRIMARY: &str = "test/primary";
pub const FALLBACK: &str = "test/fallback";

/// Samples rendered per input character
pub const SAMPLES_PER_CHAR: usize = 600;

/// Model loader whose behavior is set per test.
///
/// Rendering text containing "fail" errors, "silent" returns no samples and
/// "slow" sleeps for 300 ms first.
#[derive(Clone)]
pub struct MockLoader {
    pub broken: Vec<String>,
    pub sample_rates: HashMap<String, u32>,
    pub warm_up_fails: bool,
    pub peak: f32,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self {
            broken: Vec::new(),
            sample_rates: HashMap::new(),
            warm_up_fails: false,
            peak: 0.5,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn broken(mut self, model_id: &str) -> Self {
        self.broken.push(model_id.to_string());
        self
    }

    pub fn sample_rate(mut self, model_id: &str, rate: u32) -> Self {
        self.sample_rates.insert(model_id.to_string(), rate);
        self
    }

    pub fn peak(mut self, peak: f32) -> Self {
        self.peak = peak;
        self
    }

    pub fn failing_warm_up(mut self) -> Self {
        self.warm_up_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl ModelLoader for MockLoader {
    fn materialize(&self, model_id: &str, device: Device) -> Result<Box<dyn SpeechModel>> {
        self.log
            .lock()
            .unwrap()
            .push(format!("materialize {} {}", model_id, device));
        if self.broken.iter().any(|b| b == model_id) {
            bail!("cannot construct {}", model_id);
        }

        Ok(Box::new(MockModel {
            sample_rate: self.sample_rates.get(model_id).copied().unwrap_or(24000),
            warm_up_fails: self.warm_up_fails,
            peak: self.peak,
            log: Arc::clone(&self.log),
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockModel {
    sample_rate: u32,
    warm_up_fails: bool,
    peak: f32,
    log: Arc<Mutex<Vec<String>>>,
}

impl SpeechModel for MockModel {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_precision(&mut self, precision: Precision) -> Result<()> {
        self.log.lock().unwrap().push(format!("precision {}", precision));
        Ok(())
    }

    fn set_inference_only(&mut self) -> Result<()> {
        self.log.lock().unwrap().push("eval".to_string());
        Ok(())
    }

    fn generate(&mut self, request: &GenerateRequest) -> Result<RawWaveform> {
        self.log
            .lock()
            .unwrap()
            .push(format!("generate {}", request.text));

        if request.max_len.is_some() && self.warm_up_fails {
            bail!("warm-up kernel missing");
        }
        if request.text.contains("fail") {
            bail!("inference exploded");
        }
        if request.text.contains("silent") {
            return Ok(RawWaveform::mono(SampleBuffer::F32(Vec::new())));
        }
        if request.text.contains("slow") {
            std::thread::sleep(Duration::from_millis(300));
        }

        let total = request.text.chars().count() * SAMPLES_PER_CHAR;
        let samples = (0..total)
            .map(|i| self.peak * ((i as f32) * 0.05).sin())
            .collect();
        Ok(RawWaveform::mono(SampleBuffer::F32(samples)))
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        primary_model: PRIMARY.to_string(),
        fallback_model: FALLBACK.to_string(),
        device: Device::Cpu,
        ..EngineSettings::default()
    }
}

/// A running server and the means to stop it
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(loader: &dyn ModelLoader) -> Result<Self> {
        Self::start_with(loader, settings(), 1024).await
    }

    pub async fn start_with(
        loader: &dyn ModelLoader,
        settings: EngineSettings,
        max_text_bytes: usize,
    ) -> Result<Self> {
        let model = ModelHandle::load(loader, &settings)?;
        let state = AppState::new(model, max_text_bytes);

        let listener = server::bind("127.0.0.1", 0).await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(server::serve(listener, state.clone(), async move {
            let _ = rx.await;
        }));

        Ok(Self {
            addr,
            state,
            shutdown: Some(tx),
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}
