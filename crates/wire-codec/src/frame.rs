use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `type` value of frames that carry a topic payload.
pub const MESSAGE_FRAME: &str = "MESSAGE";

/// A transport-level frame as handed to the client's message entry point.
///
/// Fields the codec does not need are captured in `extra` so frames
/// round-trip losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Frame discriminator (`MESSAGE`, `RESPONSE`, `PONG`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Envelope; only meaningful on `MESSAGE` frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The envelope of a `MESSAGE` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// JSON document encoded as a string. Absent on some envelopes; kept
    /// absent on the way back out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawMessage {
    /// Build a `MESSAGE` frame for `topic` carrying an already-encoded payload.
    pub fn message(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: MESSAGE_FRAME.to_string(),
            data: Some(MessageData {
                topic: Some(topic.into()),
                message: Some(message.into()),
                extra: Map::new(),
            }),
            extra: Map::new(),
        }
    }

    /// Build a control frame with no envelope.
    pub fn control(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
            extra: Map::new(),
        }
    }

    pub fn is_message_frame(&self) -> bool {
        self.kind == MESSAGE_FRAME
    }

    /// The envelope, if this is a `MESSAGE` frame with a non-empty topic.
    pub fn structured(&self) -> Option<&MessageData> {
        if !self.is_message_frame() {
            return None;
        }
        self.data.as_ref().filter(|d| d.has_topic())
    }

    /// Mutable access to the envelope under the same conditions as
    /// [`structured`](Self::structured).
    pub fn structured_mut(&mut self) -> Option<&mut MessageData> {
        if !self.is_message_frame() {
            return None;
        }
        self.data.as_mut().filter(|d| d.has_topic())
    }
}

impl MessageData {
    pub fn has_topic(&self) -> bool {
        self.topic.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// The topic, or `""` when absent.
    pub fn topic(&self) -> &str {
        self.topic.as_deref().unwrap_or("")
    }

    /// The encoded payload, or `""` when absent.
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}
