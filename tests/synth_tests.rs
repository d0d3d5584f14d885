// Integration tests for the audio framing adapter
//
// These tests drive the local and remote synthesizers end to end and check
// that both produce the same lead-in-then-frames sequence.

mod common;

use anyhow::Result;
use common::{MockLoader, TestServer, SAMPLES_PER_CHAR};
use futures::StreamExt;
use sirius_voice::audio::{AudioFrame, AudioWaveform, FrameLayout};
use sirius_voice::engine::{EngineSettings, ModelHandle, ToneLoader};
use sirius_voice::error::{SynthesisError, TransportError};
use sirius_voice::synth::{LocalSynthesizer, RemoteSynthesizer, Synthesizer};
use std::time::Duration;

fn remote(server: &TestServer) -> RemoteSynthesizer {
    RemoteSynthesizer::new(
        server.url(),
        Duration::from_secs(2),
        Duration::from_secs(5),
        FrameLayout::new(24000),
        1024,
    )
}

fn assert_lead_in(frame: &AudioFrame) {
    assert!(frame.is_silent());
    assert_eq!(frame.sample_count(), 480);
    assert_eq!(frame.duration(), Duration::from_millis(20));
    assert_eq!(frame.channels(), 1);
}

#[tokio::test]
async fn test_remote_frames_match_server_payload() -> Result<()> {
    let server = TestServer::start(&MockLoader::new()).await?;
    let synth = remote(&server);

    let (frames, error) = synth.synthesize("Hello").await?.collect_all().await;
    assert!(error.is_none(), "unexpected error: {:?}", error);

    assert_lead_in(&frames[0]);
    let audio = &frames[1..];
    let total: usize = audio.iter().map(|f| f.sample_count()).sum();
    assert_eq!(total, 5 * SAMPLES_PER_CHAR);
    assert!(audio[..audio.len() - 1].iter().all(|f| f.sample_count() == 1200));
    assert!(audio.iter().all(|f| f.pcm16_bytes().len() == f.sample_count() * 2));
    Ok(())
}

#[tokio::test]
async fn test_remote_connection_is_reused() -> Result<()> {
    let server = TestServer::start(&MockLoader::new()).await?;
    let synth = remote(&server);

    for text in ["one", "two", "three"] {
        let (_, error) = synth.synthesize(text).await?.collect_all().await;
        assert!(error.is_none());
    }

    let stats = server.state.stats.snapshot(&server.state.model);
    assert_eq!(stats.connections_total, 1);
    assert_eq!(stats.requests_total, 3);
    Ok(())
}

#[tokio::test]
async fn test_remote_server_error_keeps_the_connection() -> Result<()> {
    let server = TestServer::start(&MockLoader::new()).await?;
    let synth = remote(&server);

    let (frames, error) = synth.synthesize("this will fail").await?.collect_all().await;
    assert_eq!(frames.len(), 1);
    assert_lead_in(&frames[0]);
    match error {
        Some(SynthesisError::Remote(message)) => assert!(message.contains("inference exploded")),
        other => panic!("expected a remote error, got {:?}", other),
    }

    let (_, error) = synth.synthesize("Hello").await?.collect_all().await;
    assert!(error.is_none());
    assert_eq!(server.state.stats.snapshot(&server.state.model).connections_total, 1);
    Ok(())
}

#[tokio::test]
async fn test_remote_close_forces_a_new_connection() -> Result<()> {
    let server = TestServer::start(&MockLoader::new()).await?;
    let synth = remote(&server);

    let (_, error) = synth.synthesize("one").await?.collect_all().await;
    assert!(error.is_none());
    synth.close().await;

    let (_, error) = synth.synthesize("two").await?.collect_all().await;
    assert!(error.is_none());
    assert_eq!(server.state.stats.snapshot(&server.state.model).connections_total, 2);
    Ok(())
}

#[tokio::test]
async fn test_remote_connection_refused_is_a_transport_error() -> Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let synth = RemoteSynthesizer::new(
        format!("ws://{}", addr),
        Duration::from_secs(2),
        Duration::from_secs(2),
        FrameLayout::new(24000),
        1024,
    );

    let (frames, error) = synth.synthesize("Hello").await?.collect_all().await;
    assert_eq!(frames.len(), 1);
    assert_lead_in(&frames[0]);
    assert!(matches!(error, Some(SynthesisError::Transport(_))));
    Ok(())
}

#[tokio::test]
async fn test_remote_rejects_blank_text_before_connecting() -> Result<()> {
    let server = TestServer::start(&MockLoader::new()).await?;
    let synth = remote(&server);

    assert!(matches!(
        synth.synthesize(" \t ").await,
        Err(SynthesisError::EmptyText)
    ));
    assert_eq!(server.state.stats.snapshot(&server.state.model).connections_total, 0);
    Ok(())
}

#[tokio::test]
async fn test_remote_request_timeout() -> Result<()> {
    let server = TestServer::start(&MockLoader::new()).await?;
    let synth = RemoteSynthesizer::new(
        server.url(),
        Duration::from_secs(2),
        Duration::from_millis(100),
        FrameLayout::new(24000),
        1024,
    );

    let (_, error) = synth.synthesize("slow").await?.collect_all().await;
    assert!(matches!(
        error,
        Some(SynthesisError::Transport(TransportError::Timeout(_)))
    ));

    // The timed-out connection was dropped; the next request reconnects
    tokio::time::sleep(Duration::from_millis(400)).await;
    let (_, error) = synth.synthesize("Hello").await?.collect_all().await;
    assert!(error.is_none());
    assert_eq!(server.state.stats.snapshot(&server.state.model).connections_total, 2);
    Ok(())
}

#[tokio::test]
async fn test_remote_cancelled_utterance_leaves_the_client_usable() -> Result<()> {
    let server = TestServer::start(&MockLoader::new()).await?;
    let synth = remote(&server);

    let mut stream = synth.synthesize("slow").await?;
    let lead_in = stream.next_frame().await.expect("lead-in frame")?;
    assert_lead_in(&lead_in);

    // Let the request reach the server, then walk away mid-render
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(stream);

    let (frames, error) = synth.synthesize("Hello").await?.collect_all().await;
    assert!(error.is_none(), "unexpected error: {:?}", error);

    // "Hello" renders 5 characters, the abandoned "slow" only 4
    assert_lead_in(&frames[0]);
    let total: usize = frames[1..].iter().map(|f| f.sample_count()).sum();
    assert_eq!(total, 5 * SAMPLES_PER_CHAR);

    // The abandoned socket is never handed back to the pool
    assert_eq!(server.state.stats.snapshot(&server.state.model).connections_total, 2);
    Ok(())
}

#[tokio::test]
async fn test_local_and_remote_agree() -> Result<()> {
    let settings = EngineSettings {
        primary_model: "tone".to_string(),
        fallback_model: "tone".to_string(),
        ..EngineSettings::default()
    };
    let server = TestServer::start_with(&ToneLoader, settings.clone(), 1024).await?;
    let local = LocalSynthesizer::new(
        ModelHandle::load(&ToneLoader, &settings)?,
        FrameLayout::new(24000),
        1024,
    )?;
    let remote = remote(&server);

    let (local_frames, _) = local.synthesize("Hello there").await?.collect_all().await;
    let (remote_frames, _) = remote.synthesize("Hello there").await?.collect_all().await;

    assert_eq!(local_frames, remote_frames);
    Ok(())
}

#[tokio::test]
async fn test_frame_stream_is_a_stream() -> Result<()> {
    let server = TestServer::start(&MockLoader::new()).await?;
    let synth = remote(&server);

    let frames: Vec<_> = synth.synthesize("Hello").await?.collect().await;
    assert!(frames.iter().all(|f| f.is_ok()));
    assert_eq!(frames.len(), 1 + 3);
    Ok(())
}

#[test]
fn test_framing_accounts_for_every_sample() {
    let layout = FrameLayout::new(24000);

    for len in [0usize, 1, 1199, 1200, 1201, 2400, 24000, 24001, 30_599] {
        let samples: Vec<i16> = (0..len).map(|i| (i % 3000) as i16).collect();
        let frames: Vec<_> = layout
            .frames(AudioWaveform::new(samples.clone(), 24000))
            .collect();

        let total: usize = frames.iter().map(|f| f.sample_count()).sum();
        assert_eq!(total, len, "length {}", len);
        assert_eq!(frames.len(), (len + 1199) / 1200, "length {}", len);

        // Order is preserved across frame boundaries
        let rebuilt: Vec<i16> = frames.iter().flat_map(|f| f.samples()).collect();
        assert_eq!(rebuilt, samples);
    }
}
