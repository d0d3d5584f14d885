use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{validate_text, FrameStream, Synthesizer, UtteranceDriver};
use crate::audio::{AudioWaveform, FrameLayout};
use crate::config::ClientConfig;
use crate::error::{SynthesisError, TransportError};
use crate::server::{ErrorResponse, SynthesisRequest};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Synthesizer that asks a streaming transport server for audio
///
/// Keeps at most one open connection. It is reused across utterances and
/// dropped after any transport failure, so the next utterance reconnects.
#[derive(Debug, Clone)]
pub struct RemoteSynthesizer {
    remote: Arc<RemoteEndpoint>,
    driver: UtteranceDriver,
    max_text_bytes: usize,
}

struct RemoteEndpoint {
    url: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    connection: Mutex<Option<WsStream>>,
}

impl std::fmt::Debug for RemoteEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEndpoint")
            .field("url", &self.url)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl RemoteSynthesizer {
    pub fn new(
        url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
        layout: FrameLayout,
        max_text_bytes: usize,
    ) -> Self {
        Self {
            remote: Arc::new(RemoteEndpoint {
                url: url.into(),
                connect_timeout,
                request_timeout,
                connection: Mutex::new(None),
            }),
            driver: UtteranceDriver::new(layout),
            max_text_bytes,
        }
    }

    pub fn from_config(config: &ClientConfig, layout: FrameLayout, max_text_bytes: usize) -> Self {
        Self::new(
            config.url.clone(),
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
            layout,
            max_text_bytes,
        )
    }

    pub fn url(&self) -> &str {
        &self.remote.url
    }

    /// Close the pooled connection, if any.
    pub async fn close(&self) {
        if let Some(mut ws) = self.remote.connection.lock().await.take() {
            if let Err(e) = ws.close(None).await {
                debug!("Error closing connection to {}: {}", self.remote.url, e);
            }
        }
    }
}

#[async_trait::async_trait]
impl Synthesizer for RemoteSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<FrameStream, SynthesisError> {
        let text = validate_text(text, self.max_text_bytes)?;
        let remote = Arc::clone(&self.remote);
        let sample_rate = self.driver.layout().sample_rate;
        Ok(self
            .driver
            .start(async move { remote.fetch(&text, sample_rate).await }))
    }

    fn layout(&self) -> FrameLayout {
        self.driver.layout()
    }

    fn name(&self) -> &str {
        "remote"
    }
}

impl RemoteEndpoint {
    async fn fetch(&self, text: &str, sample_rate: u32) -> Result<AudioWaveform, SynthesisError> {
        let payload = serde_json::to_string(&SynthesisRequest::new(text))
            .map_err(|e| TransportError::Send(e.to_string()))?;

        let mut slot = self.connection.lock().await;
        let (mut ws, reused) = match slot.take() {
            Some(ws) => (ws, true),
            None => (self.connect().await?, false),
        };

        let mut result = self.exchange(&mut ws, &payload).await;
        if reused && is_stale(&result) {
            debug!("Pooled connection to {} went stale; reconnecting", self.url);
            ws = self.connect().await?;
            result = self.exchange(&mut ws, &payload).await;
        }

        // The connection is only trusted again if the server answered in protocol
        if matches!(result, Ok(_) | Err(SynthesisError::Remote(_))) {
            *slot = Some(ws);
        }
        drop(slot);

        let bytes = result?;
        AudioWaveform::from_pcm16_bytes(&bytes, sample_rate).ok_or_else(|| {
            TransportError::MalformedPayload(format!("odd byte count {}", bytes.len())).into()
        })
    }

    async fn connect(&self) -> Result<WsStream, TransportError> {
        info!("Connecting to TTS server at {}", self.url);

        match tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str())).await {
            Ok(Ok((ws, _response))) => {
                info!("Connected to TTS server at {}", self.url);
                Ok(ws)
            }
            Ok(Err(e)) => Err(TransportError::Connect {
                url: self.url.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(TransportError::ConnectTimeout(self.url.clone())),
        }
    }

    /// Send one request and wait for its single reply.
    async fn exchange(&self, ws: &mut WsStream, payload: &str) -> Result<Vec<u8>, SynthesisError> {
        match tokio::time::timeout(self.request_timeout, round_trip(ws, payload)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "No reply from {} within {}s",
                    self.url,
                    self.request_timeout.as_secs()
                );
                Err(TransportError::Timeout(self.request_timeout.as_secs()).into())
            }
        }
    }
}

async fn round_trip(ws: &mut WsStream, payload: &str) -> Result<Vec<u8>, SynthesisError> {
    ws.send(Message::Text(payload.to_string().into()))
        .await
        .map_err(|e| TransportError::Send(e.to_string()))?;

    loop {
        match ws.next().await {
            Some(Ok(Message::Binary(bytes))) => return Ok(bytes.to_vec()),
            Some(Ok(Message::Text(text))) => {
                let reply: ErrorResponse = serde_json::from_str(text.as_str())
                    .map_err(|_| TransportError::MalformedPayload(text.to_string()))?;
                return Err(SynthesisError::Remote(reply.error));
            }
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed.into()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::Receive(e.to_string()).into()),
        }
    }
}

/// A reused connection that failed before any reply was read
fn is_stale<T>(result: &Result<T, SynthesisError>) -> bool {
    matches!(
        result,
        Err(SynthesisError::Transport(
            TransportError::Send(_) | TransportError::Receive(_) | TransportError::Closed
        ))
    )
}
