use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Client → server: one utterance to synthesize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    #[serde(default)]
    pub text: String,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Server → client failure message
///
/// Success responses carry no JSON: they are a single binary message of
/// little-endian PCM16 samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        // A struct of one String cannot fail to serialize
        serde_json::to_string(self).unwrap_or_else(|_| String::from(r#"{"error":"internal"}"#))
    }
}

/// Parse and validate one inbound request, returning the trimmed text.
pub fn parse_request(raw: &[u8], max_text_bytes: usize) -> Result<String, ProtocolError> {
    let request: SynthesisRequest =
        serde_json::from_slice(raw).map_err(|_| ProtocolError::InvalidJson)?;

    let text = request.text.trim();
    if text.is_empty() {
        return Err(ProtocolError::EmptyText);
    }
    if text.len() > max_text_bytes {
        return Err(ProtocolError::TextTooLong {
            len: text.len(),
            limit: max_text_bytes,
        });
    }

    Ok(text.to_string())
}
