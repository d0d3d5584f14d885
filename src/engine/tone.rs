use anyhow::{bail, Context, Result};
use std::f32::consts::PI;

use super::model::{Device, GenerateRequest, ModelLoader, Precision, SpeechModel};
use crate::audio::{RawWaveform, SampleBuffer};

const DEFAULT_TONE_RATE: u32 = 24_000;
const SYMBOL_MS: u32 = 40;
const AMPLITUDE: f32 = 0.6;

/// Built-in model that renders each character as a short tone.
///
/// Needs no weights or accelerator, so the server and CLI run end to end on
/// any machine. Identifiers: `tone` (24 kHz) or `tone:<rate>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToneLoader;

impl ModelLoader for ToneLoader {
    fn materialize(&self, model_id: &str, _device: Device) -> Result<Box<dyn SpeechModel>> {
        let sample_rate = match model_id.split_once(':') {
            None if model_id == "tone" => DEFAULT_TONE_RATE,
            Some(("tone", rate)) => rate
                .parse()
                .with_context(|| format!("Invalid tone sample rate '{}'", rate))?,
            _ => bail!("unknown tone model '{}'", model_id),
        };

        if sample_rate == 0 {
            bail!("tone sample rate must be positive");
        }

        Ok(Box::new(ToneModel { sample_rate }))
    }

    fn name(&self) -> &str {
        "tone"
    }
}

#[derive(Debug)]
struct ToneModel {
    sample_rate: u32,
}

impl ToneModel {
    fn symbol_frequency(c: char) -> f32 {
        220.0 + (c as u32 % 48) as f32 * 15.0
    }
}

impl SpeechModel for ToneModel {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_precision(&mut self, _precision: Precision) -> Result<()> {
        Ok(())
    }

    fn set_inference_only(&mut self) -> Result<()> {
        Ok(())
    }

    fn generate(&mut self, request: &GenerateRequest) -> Result<RawWaveform> {
        let per_symbol = (self.sample_rate * SYMBOL_MS / 1000) as usize;
        let mut samples = Vec::with_capacity(request.text.chars().count() * per_symbol);

        for c in request.text.chars() {
            if c.is_whitespace() {
                samples.extend(std::iter::repeat(0.0).take(per_symbol));
                continue;
            }

            let freq = Self::symbol_frequency(c);
            for i in 0..per_symbol {
                let t = i as f32 / self.sample_rate as f32;
                // linear fade in/out to avoid clicks between symbols
                let edge = (i.min(per_symbol - 1 - i) as f32 / 64.0).min(1.0);
                samples.push(AMPLITUDE * edge * (2.0 * PI * freq * t).sin());
            }

            if let Some(max_len) = request.max_len {
                if samples.len() >= max_len * per_symbol {
                    break;
                }
            }
        }

        Ok(RawWaveform::mono(SampleBuffer::F32(samples)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::InferenceParams;

    #[test]
    fn tone_ids_select_sample_rate() {
        let loader = ToneLoader;
        assert_eq!(loader.materialize("tone", Device::Cpu).unwrap().sample_rate(), 24_000);
        assert_eq!(loader.materialize("tone:16000", Device::Cpu).unwrap().sample_rate(), 16_000);
        assert!(loader.materialize("tone:fast", Device::Cpu).is_err());
        assert!(loader.materialize("openbmb/VoxCPM-0.5B", Device::Cpu).is_err());
    }

    #[test]
    fn renders_forty_ms_per_character() {
        let mut model = ToneLoader.materialize("tone", Device::Cpu).unwrap();
        let raw = model
            .generate(&GenerateRequest::new("Hi there", InferenceParams::default()))
            .unwrap();
        assert_eq!(raw.samples.len(), 8 * 960);
    }
}
