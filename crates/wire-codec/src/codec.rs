use serde_json::Value;

use crate::frame::RawMessage;

/// A payload or frame that is not valid JSON.
///
/// Holds the rendered parser error rather than the parser error itself so
/// it can be cloned and handed out again for a cached failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed JSON: {reason}")]
pub struct DecodeError {
    pub reason: String,
}

/// A value that could not be serialized back to JSON.
#[derive(Debug, thiserror::Error)]
#[error("failed to encode payload: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            reason: err.to_string(),
        }
    }
}

/// Decode the string-encoded payload of an envelope.
pub fn decode(message: &str) -> Result<Value, DecodeError> {
    Ok(serde_json::from_str(message)?)
}

/// Encode a payload into the string form stored in an envelope.
pub fn encode(payload: &Value) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(payload)?)
}

/// Parse one frame (e.g. a line of a capture file).
pub fn parse_frame(text: &str) -> Result<RawMessage, DecodeError> {
    Ok(serde_json::from_str(text)?)
}

/// Render a frame as a single JSON line.
pub fn render_frame(raw: &RawMessage) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(raw)?)
}
