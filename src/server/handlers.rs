use super::protocol::{parse_request, ErrorResponse};
use super::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::{error, info, warn};
use uuid::Uuid;

/// What the server sends back for one request
enum Reply {
    Audio(Vec<u8>),
    Error(ErrorResponse),
}

/// GET / (WebSocket upgrade)
/// One persistent synthesis connection
pub async fn synthesize_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Serve requests on one connection until the client goes away.
///
/// Malformed requests and synthesis failures are answered with an error
/// message; they never end the connection.
async fn handle_connection(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    state.stats.connection_opened();
    info!("Client connected ({})", connection_id);

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!("Connection {} failed: {}", connection_id, e);
                break;
            }
        };

        let reply = match message {
            Message::Text(text) => serve_request(&state, text.as_bytes()).await,
            Message::Binary(bytes) => serve_request(&state, &bytes).await,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => break,
        };

        let outbound = match reply {
            Reply::Audio(bytes) => {
                let len = bytes.len();
                state.stats.request_served(len);
                info!("Sent {} bytes of audio ({})", len, connection_id);
                Message::Binary(bytes)
            }
            Reply::Error(err) => {
                state.stats.request_failed();
                Message::Text(err.to_json())
            }
        };

        if let Err(e) = socket.send(outbound).await {
            warn!("Failed to send reply on {}: {}", connection_id, e);
            break;
        }
    }

    state.stats.connection_closed();
    info!("Client disconnected ({})", connection_id);
}

async fn serve_request(state: &AppState, raw: &[u8]) -> Reply {
    let text = match parse_request(raw, state.max_text_bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("Rejected request: {}", e);
            return Reply::Error(ErrorResponse::new(e));
        }
    };

    info!("Synthesizing: {}", preview(&text));

    match state.model.render(&text).await {
        Ok(waveform) => Reply::Audio(waveform.to_pcm16_bytes()),
        Err(e) => {
            error!("TTS synthesis failed: {}", e);
            Reply::Error(ErrorResponse::new(e))
        }
    }
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 50;
    if text.chars().count() <= MAX_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_CHARS).collect();
    format!("{}...", head)
}

/// GET /stats
/// Server and model statistics
pub async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.stats.snapshot(&state.model)))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
