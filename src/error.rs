use thiserror::Error;

/// Fatal startup failure: no usable speech model could be brought up.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("failed to load model {model_id}: {reason}")]
    Construct { model_id: String, reason: String },

    #[error("model {model_id} renders at {actual} Hz but the service is configured for {expected} Hz")]
    SampleRateMismatch {
        model_id: String,
        expected: u32,
        actual: u32,
    },

    #[error("primary model {primary} failed ({primary_error}) and fallback model {fallback} failed ({fallback_error})")]
    FallbackExhausted {
        primary: String,
        primary_error: Box<ModelLoadError>,
        fallback: String,
        fallback_error: Box<ModelLoadError>,
    },
}

/// Per-utterance failure. Recoverable: the caller may retry or skip the utterance.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Empty text")]
    EmptyText,

    #[error("text exceeds maximum size: {len} bytes (limit: {limit} bytes)")]
    TextTooLong { len: usize, limit: usize },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("synthesis timed out after {0} seconds")]
    Timeout(u64),

    #[error("server rejected request: {0}")]
    Remote(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Malformed or empty request, reported back on the same connection.
///
/// The `Display` strings double as the `error` field of the wire response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Empty text")]
    EmptyText,

    #[error("Text too long: {len} bytes (limit: {limit} bytes)")]
    TextTooLong { len: usize, limit: usize },
}

/// Connection-level failure. Recoverable by reconnecting on the next utterance.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("failed to send request: {0}")]
    Send(String),

    #[error("failed to receive response: {0}")]
    Receive(String),

    #[error("connection closed by server")]
    Closed,

    #[error("no response within {0} seconds")]
    Timeout(u64),

    #[error("malformed audio payload: {0}")]
    MalformedPayload(String),
}
