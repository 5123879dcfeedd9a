use serde_json::Value;
use tracing::warn;
use wire_codec::{DecodeError, MessageData, TopicParts};

/// Decode state of an event's payload.
///
/// `Undecoded -> Decoded` on first read, `Decoded -> Overridden` on write.
/// A failed decode is cached and never retried.
#[derive(Debug)]
enum PayloadState {
    Undecoded,
    Decoded(Value),
    Overridden(Value),
    Failed(DecodeError),
}

/// One inbound pubsub message as seen by observers.
///
/// Built per structured frame, published synchronously, then consumed by
/// the dispatcher. Observers may read or replace the payload and may
/// prevent the client from processing the frame.
#[derive(Debug)]
pub struct PubSubEvent<'a> {
    parts: TopicParts,
    envelope: &'a MessageData,
    payload: PayloadState,
    decode_attempts: u32,
    suppressed: bool,
}

/// What the dispatcher needs from an event once observers are done.
#[derive(Debug, Clone, PartialEq)]
pub struct EventOutcome {
    pub suppressed: bool,
    /// The replacement payload, present only if the event was changed.
    pub rewrite: Option<Value>,
}

impl<'a> PubSubEvent<'a> {
    pub fn new(envelope: &'a MessageData) -> Self {
        Self {
            parts: wire_codec::split_topic(envelope.topic()),
            envelope,
            payload: PayloadState::Undecoded,
            decode_attempts: 0,
            suppressed: false,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.parts.prefix
    }

    pub fn trailer(&self) -> &str {
        &self.parts.trailer
    }

    /// The full topic from the envelope.
    pub fn topic(&self) -> &str {
        self.envelope.topic()
    }

    /// The payload exactly as it arrived on the wire (`""` when the
    /// envelope had none).
    pub fn raw_message(&self) -> &str {
        self.envelope.message()
    }

    /// The decoded payload. Decodes on first access only; a decode failure
    /// is returned again on every later access.
    pub fn payload(&mut self) -> Result<&Value, DecodeError> {
        self.ensure_decoded();
        match &self.payload {
            PayloadState::Decoded(value) | PayloadState::Overridden(value) => Ok(value),
            PayloadState::Failed(err) => Err(err.clone()),
            PayloadState::Undecoded => unreachable!("payload decoded above"),
        }
    }

    /// Mutable access to the payload. Counts as a write.
    pub fn payload_mut(&mut self) -> Result<&mut Value, DecodeError> {
        self.ensure_decoded();
        self.payload = match std::mem::replace(&mut self.payload, PayloadState::Undecoded) {
            PayloadState::Decoded(value) => PayloadState::Overridden(value),
            other => other,
        };
        match &mut self.payload {
            PayloadState::Overridden(value) => Ok(value),
            PayloadState::Failed(err) => Err(err.clone()),
            PayloadState::Decoded(_) | PayloadState::Undecoded => {
                unreachable!("payload promoted above")
            }
        }
    }

    /// Replace the payload without decoding the original.
    pub fn set_payload(&mut self, value: Value) {
        self.payload = PayloadState::Overridden(value);
    }

    /// Flag the current payload for write-back. No effect if it cannot be
    /// decoded.
    pub fn mark_changed(&mut self) {
        let _ = self.payload_mut();
    }

    pub fn is_changed(&self) -> bool {
        matches!(self.payload, PayloadState::Overridden(_))
    }

    /// Stop the client from processing this frame.
    pub fn prevent_default(&mut self) {
        self.suppressed = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.suppressed
    }

    /// Number of times the payload decoder has run for this event.
    pub fn decode_attempts(&self) -> u32 {
        self.decode_attempts
    }

    pub fn into_outcome(self) -> EventOutcome {
        let rewrite = match self.payload {
            PayloadState::Overridden(value) => Some(value),
            _ => None,
        };
        EventOutcome {
            suppressed: self.suppressed,
            rewrite,
        }
    }

    fn ensure_decoded(&mut self) {
        if !matches!(self.payload, PayloadState::Undecoded) {
            return;
        }
        self.decode_attempts += 1;
        self.payload = match wire_codec::decode(self.envelope.message()) {
            Ok(value) => PayloadState::Decoded(value),
            Err(err) => {
                warn!(topic = %self.envelope.topic(), %err, "failed to decode pubsub payload");
                PayloadState::Failed(err)
            }
        };
    }
}
