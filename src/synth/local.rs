use super::{validate_text, FrameStream, Synthesizer, UtteranceDriver};
use crate::audio::FrameLayout;
use crate::engine::ModelHandle;
use crate::error::{ModelLoadError, SynthesisError};

/// Synthesizer backed by an in-process model
#[derive(Debug, Clone)]
pub struct LocalSynthesizer {
    model: ModelHandle,
    driver: UtteranceDriver,
    max_text_bytes: usize,
}

impl LocalSynthesizer {
    /// Fails if the layout is framed for a different rate than the model renders at.
    pub fn new(
        model: ModelHandle,
        layout: FrameLayout,
        max_text_bytes: usize,
    ) -> Result<Self, ModelLoadError> {
        if layout.sample_rate != model.sample_rate() {
            return Err(ModelLoadError::SampleRateMismatch {
                model_id: model.model_id().to_string(),
                expected: layout.sample_rate,
                actual: model.sample_rate(),
            });
        }

        Ok(Self {
            model,
            driver: UtteranceDriver::new(layout),
            max_text_bytes,
        })
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }
}

#[async_trait::async_trait]
impl Synthesizer for LocalSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<FrameStream, SynthesisError> {
        let text = validate_text(text, self.max_text_bytes)?;
        let model = self.model.clone();
        Ok(self.driver.start(async move { model.render(&text).await }))
    }

    fn layout(&self) -> FrameLayout {
        self.driver.layout()
    }

    fn name(&self) -> &str {
        "local"
    }
}
