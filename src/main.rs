use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sirius_voice::config::{Backend, Config};
use sirius_voice::engine::{ModelHandle, ModelLoader, ToneLoader, WorkerLoader};
use sirius_voice::server::{self, AppState};
use sirius_voice::synth::{LocalSynthesizer, RemoteSynthesizer, Synthesizer};
use sirius_voice::{VoiceSession, VoiceSessionConfig, WavSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sirius-voice")]
#[command(about = "Low-latency text-to-speech for realtime voice sessions")]
struct Args {
    /// Config file, without extension
    #[arg(short, long, default_value = "config/sirius-voice", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the model and serve synthesis over WebSocket until Ctrl+C
    Serve {
        /// Listen port (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Synthesize one utterance into a WAV file
    Say {
        /// Text to speak
        #[arg(short, long)]
        text: String,

        /// Output WAV path
        #[arg(short, long, default_value = "utterance.wav")]
        out: PathBuf,

        /// Run the model in process instead of asking the server
        #[arg(long)]
        local: bool,

        /// Server URL (overrides client.url)
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Sirius Voice v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Serve { port } => serve(cfg, port).await,
        Command::Say {
            text,
            out,
            local,
            url,
        } => say(cfg, &text, out, local, url).await,
    }
}

async fn serve(cfg: Config, port: Option<u16>) -> Result<()> {
    // The port is only bound once a model is ready
    let model = load_model(&cfg).await?;
    let state = AppState::new(model, cfg.server.max_text_bytes);

    let listener = server::bind(&cfg.server.bind, port.unwrap_or(cfg.server.port)).await?;
    server::serve(listener, state, shutdown_signal()).await
}

async fn say(cfg: Config, text: &str, out: PathBuf, local: bool, url: Option<String>) -> Result<()> {
    let layout = cfg.frame_layout();

    let synthesizer: Arc<dyn Synthesizer> = if local {
        let model = load_model(&cfg).await?;
        Arc::new(LocalSynthesizer::new(model, layout, cfg.server.max_text_bytes)?)
    } else {
        let mut client = cfg.client.clone();
        if let Some(url) = url {
            client.url = url;
        }
        Arc::new(RemoteSynthesizer::from_config(&client, layout, cfg.server.max_text_bytes))
    };

    let sink = WavSink::create(&out, layout.sample_rate)?;
    let mut session = VoiceSession::new(VoiceSessionConfig::default(), synthesizer, sink);

    let report = session.speak(text).await?;
    let (sink, _stats) = session.finish().await?;
    let path = sink.finish()?;

    match report.error {
        Some(e) => anyhow::bail!("Synthesis failed: {}", e),
        None => {
            info!(
                "Saved {} frames to {} (first audio after {} ms)",
                report.frames,
                path.display(),
                report.first_audio_ms.unwrap_or_default()
            );
            Ok(())
        }
    }
}

async fn load_model(cfg: &Config) -> Result<ModelHandle> {
    let loader: Box<dyn ModelLoader> = match cfg.engine.backend {
        Backend::Worker => Box::new(WorkerLoader::new(
            cfg.engine.worker_program.clone(),
            cfg.engine.worker_args.clone(),
        )),
        Backend::Tone => Box::new(ToneLoader),
    };
    let settings = cfg.engine_settings();

    let loaded = tokio::task::spawn_blocking(move || ModelHandle::load(loader.as_ref(), &settings))
        .await
        .context("Model load task failed")?;

    loaded.map_err(|e| {
        error!("Failed to load TTS model: {}", e);
        anyhow::Error::new(e).context("No usable TTS model")
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
}
