// Integration tests for bringing up and rendering with the speech model
//
// These tests verify the primary -> fallback load sequence, the CPU
// precision and warm-up rules, and output normalization.

mod common;

use anyhow::Result;
use common::{settings, MockLoader, FALLBACK, PRIMARY, SAMPLES_PER_CHAR};
use sirius_voice::engine::{Device, ModelHandle};
use sirius_voice::error::{ModelLoadError, SynthesisError};
use std::time::Duration;

#[test]
fn test_primary_model_is_preferred() -> Result<()> {
    let loader = MockLoader::new();
    let model = ModelHandle::load(&loader, &settings())?;

    assert_eq!(model.model_id(), PRIMARY);
    assert!(!model.is_fallback());
    assert_eq!(model.sample_rate(), 24000);
    Ok(())
}

#[test]
fn test_broken_primary_falls_back() -> Result<()> {
    let loader = MockLoader::new().broken(PRIMARY);
    let model = ModelHandle::load(&loader, &settings())?;

    assert_eq!(model.model_id(), FALLBACK);
    assert!(model.is_fallback());

    let calls = loader.calls();
    assert_eq!(calls[0], format!("materialize {} cpu", PRIMARY));
    assert!(calls.contains(&format!("materialize {} cpu", FALLBACK)));
    Ok(())
}

#[test]
fn test_both_models_broken_is_fatal() {
    let loader = MockLoader::new().broken(PRIMARY).broken(FALLBACK);
    let err = ModelHandle::load(&loader, &settings()).unwrap_err();

    match err {
        ModelLoadError::FallbackExhausted {
            primary, fallback, ..
        } => {
            assert_eq!(primary, PRIMARY);
            assert_eq!(fallback, FALLBACK);
        }
        other => panic!("expected FallbackExhausted, got {}", other),
    }
}

#[test]
fn test_primary_sample_rate_mismatch_falls_back() -> Result<()> {
    let loader = MockLoader::new().sample_rate(PRIMARY, 16000);
    let model = ModelHandle::load(&loader, &settings())?;

    assert_eq!(model.model_id(), FALLBACK);
    assert_eq!(model.sample_rate(), 24000);
    Ok(())
}

#[test]
fn test_fallback_sample_rate_mismatch_is_fatal() {
    let loader = MockLoader::new()
        .broken(PRIMARY)
        .sample_rate(FALLBACK, 22050);
    let err = ModelHandle::load(&loader, &settings()).unwrap_err();

    match err {
        ModelLoadError::FallbackExhausted { fallback_error, .. } => assert!(matches!(
            *fallback_error,
            ModelLoadError::SampleRateMismatch {
                expected: 24000,
                actual: 22050,
                ..
            }
        )),
        other => panic!("expected FallbackExhausted, got {}", other),
    }
}

#[test]
fn test_cpu_forces_full_precision_before_inference_mode() -> Result<()> {
    let loader = MockLoader::new();
    ModelHandle::load(&loader, &settings())?;

    let calls = loader.calls();
    let precision = calls.iter().position(|c| c == "precision float32");
    let eval = calls.iter().position(|c| c == "eval");
    assert!(precision.is_some());
    assert!(precision < eval);
    Ok(())
}

#[test]
fn test_gpu_keeps_model_precision() -> Result<()> {
    let loader = MockLoader::new();
    let mut settings = settings();
    settings.device = Device::Cuda;
    ModelHandle::load(&loader, &settings)?;

    let calls = loader.calls();
    assert!(!calls.iter().any(|c| c.starts_with("precision")));
    assert!(calls.contains(&"eval".to_string()));
    Ok(())
}

#[test]
fn test_warm_up_skipped_without_optimize() -> Result<()> {
    let loader = MockLoader::new();
    ModelHandle::load(&loader, &settings())?;

    assert!(!loader.calls().iter().any(|c| c.starts_with("generate")));
    Ok(())
}

#[test]
fn test_warm_up_runs_with_optimize() -> Result<()> {
    let loader = MockLoader::new();
    let mut settings = settings();
    settings.optimize = true;
    ModelHandle::load(&loader, &settings)?;

    assert!(loader.calls().contains(&"generate Warmup".to_string()));
    Ok(())
}

#[test]
fn test_warm_up_failure_is_not_fatal() -> Result<()> {
    let loader = MockLoader::new().failing_warm_up();
    let mut settings = settings();
    settings.optimize = true;
    let model = ModelHandle::load(&loader, &settings)?;

    // Still the primary: warm-up failures never trigger the fallback
    assert_eq!(model.model_id(), PRIMARY);
    Ok(())
}

#[tokio::test]
async fn test_render_bounds_loud_float_output() -> Result<()> {
    let loader = MockLoader::new().peak(2.0);
    let model = ModelHandle::load(&loader, &settings())?;

    let waveform = model.render("Hello").await?;
    assert_eq!(waveform.len(), 5 * SAMPLES_PER_CHAR);
    assert_eq!(waveform.sample_rate(), 24000);

    let peak = waveform.samples().iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
    assert!(peak >= 32000, "loud output should be rescaled to full scale, got {}", peak);
    assert!(peak <= i16::MAX as u16);
    Ok(())
}

#[tokio::test]
async fn test_render_keeps_bounded_output_gain() -> Result<()> {
    let loader = MockLoader::new().peak(0.5);
    let model = ModelHandle::load(&loader, &settings())?;

    let waveform = model.render("Hello").await?;
    let peak = waveform.samples().iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
    assert!(peak <= 16384, "bounded output should not be amplified, got {}", peak);
    assert!(peak > 15000);
    Ok(())
}

#[tokio::test]
async fn test_render_rejects_blank_text_without_inference() -> Result<()> {
    let loader = MockLoader::new();
    let model = ModelHandle::load(&loader, &settings())?;

    assert!(matches!(model.render("   ").await, Err(SynthesisError::EmptyText)));
    assert!(!loader.calls().iter().any(|c| c.starts_with("generate")));
    Ok(())
}

#[tokio::test]
async fn test_render_failures_are_synthesis_errors() -> Result<()> {
    let loader = MockLoader::new();
    let model = ModelHandle::load(&loader, &settings())?;

    assert!(matches!(
        model.render("please fail").await,
        Err(SynthesisError::Inference(_))
    ));
    assert!(matches!(
        model.render("silent").await,
        Err(SynthesisError::Inference(_))
    ));

    // The model is still usable afterwards
    assert!(model.render("ok").await.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_render_timeout_discards_late_result() -> Result<()> {
    let loader = MockLoader::new();
    let mut settings = settings();
    settings.render_timeout = Duration::from_millis(50);
    let model = ModelHandle::load(&loader, &settings)?;

    assert!(matches!(
        model.render("slow").await,
        Err(SynthesisError::Timeout(_))
    ));

    tokio::time::sleep(Duration::from_millis(400)).await;
    let waveform = model.render("hi").await?;
    assert_eq!(waveform.len(), 2 * SAMPLES_PER_CHAR);
    Ok(())
}

#[tokio::test]
async fn test_timed_out_callers_never_start_inference() -> Result<()> {
    let loader = MockLoader::new();
    let mut settings = settings();
    settings.render_timeout = Duration::from_millis(100);
    let model = ModelHandle::load(&loader, &settings)?;

    let renders: Vec<_> = (0..4)
        .map(|n| {
            let model = model.clone();
            tokio::spawn(async move { model.render(&format!("slow {}", n)).await })
        })
        .collect();
    for render in renders {
        assert!(matches!(render.await?, Err(SynthesisError::Timeout(_))));
    }

    // Only the render holding the model when the callers gave up ran
    tokio::time::sleep(Duration::from_millis(400)).await;
    let slow_calls = |calls: Vec<String>| {
        calls.iter().filter(|c| c.starts_with("generate slow")).count()
    };
    assert_eq!(slow_calls(loader.calls()), 1);

    let waveform = model.render("hi").await?;
    assert_eq!(waveform.len(), 2 * SAMPLES_PER_CHAR);
    assert_eq!(slow_calls(loader.calls()), 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_renders_are_serialized() -> Result<()> {
    let loader = MockLoader::new();
    let model = ModelHandle::load(&loader, &settings())?;

    let a = tokio::spawn({
        let model = model.clone();
        async move { model.render("first").await }
    });
    let b = tokio::spawn({
        let model = model.clone();
        async move { model.render("second").await }
    });

    assert_eq!(a.await??.len(), 5 * SAMPLES_PER_CHAR);
    assert_eq!(b.await??.len(), 6 * SAMPLES_PER_CHAR);
    Ok(())
}
