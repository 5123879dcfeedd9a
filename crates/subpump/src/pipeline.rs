use std::sync::Arc;

use tracing::{debug, error, trace};
use wire_codec::{EncodeError, RawMessage};

use crate::bus::EventBus;
use crate::event::PubSubEvent;

/// Unexpected failure while dispatching a frame.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to write edited payload back: {0}")]
    WriteBack(#[from] EncodeError),
}

/// Turns inbound frames into [`PubSubEvent`]s, publishes them, and applies
/// the observers' verdict back onto the frame.
pub struct Dispatcher {
    bus: Arc<EventBus>,
}

impl Dispatcher {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Process one frame. Returns `true` if the client's own delivery must
    /// be skipped.
    ///
    /// Fails open: any error is logged and reported as "do not suppress" so
    /// the client keeps working with the original frame.
    pub fn handle(&self, raw: &mut RawMessage) -> bool {
        match self.dispatch(raw) {
            Ok(suppress) => suppress,
            Err(err) => {
                error!(%err, "error processing pubsub event");
                false
            }
        }
    }

    fn dispatch(&self, raw: &mut RawMessage) -> Result<bool, PipelineError> {
        let Some(data) = raw.structured_mut() else {
            trace!("passing through unstructured frame");
            return Ok(false);
        };

        let outcome = {
            let mut event = PubSubEvent::new(data);
            self.bus.publish_message(&mut event);
            event.into_outcome()
        };

        if outcome.suppressed {
            debug!(topic = %data.topic(), "delivery suppressed by observer");
            return Ok(true);
        }

        if let Some(payload) = outcome.rewrite {
            data.message = Some(wire_codec::encode(&payload)?);
            debug!(topic = %data.topic(), "payload rewritten by observer");
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{Recorder, Scripted};

    fn dispatcher_with(observers: Vec<Arc<dyn crate::PubSubObserver>>) -> Dispatcher {
        let bus = Arc::new(EventBus::new());
        for observer in observers {
            bus.register(observer);
        }
        Dispatcher::new(bus)
    }

    #[test]
    fn control_frames_pass_through_untouched() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher_with(vec![recorder.clone()]);

        let mut raw = RawMessage::control("PONG");
        let before = raw.clone();
        assert!(!dispatcher.handle(&mut raw));
        assert_eq!(raw, before);
        assert!(recorder.messages().is_empty());
    }

    #[test]
    fn non_message_frame_with_envelope_is_not_published() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher_with(vec![
            recorder.clone(),
            Arc::new(Scripted::edit_and_suppress(json!({"x": 1}))),
        ]);

        let line = r#"{"type":"RESPONSE","data":{"topic":"t.1","message":"{}"}}"#;
        let mut raw = wire_codec::parse_frame(line).unwrap();
        assert!(!dispatcher.handle(&mut raw));
        assert_eq!(wire_codec::render_frame(&raw).unwrap(), line);
        assert!(recorder.messages().is_empty());
    }

    #[test]
    fn absent_message_is_delivered_without_one() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher_with(vec![recorder.clone()]);

        let line = r#"{"type":"MESSAGE","data":{"topic":"t.1"}}"#;
        let mut raw = wire_codec::parse_frame(line).unwrap();
        assert!(!dispatcher.handle(&mut raw));
        assert_eq!(wire_codec::render_frame(&raw).unwrap(), line);

        let seen = recorder.messages();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].payload, None);
    }

    #[test]
    fn message_frame_without_topic_is_not_published() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher_with(vec![recorder.clone()]);

        let mut raw = RawMessage::message("", r#"{"a":1}"#);
        raw.data.as_mut().unwrap().topic = None;
        let before = raw.clone();

        assert!(!dispatcher.handle(&mut raw));
        assert_eq!(raw, before);
        assert!(recorder.messages().is_empty());
    }

    #[test]
    fn one_notification_per_structured_frame() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher_with(vec![recorder.clone()]);

        let mut raw = RawMessage::message("video-playback-by-id.7", r#"{"viewers":3}"#);
        assert!(!dispatcher.handle(&mut raw));

        let seen = recorder.messages();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prefix, "video-playback-by-id");
        assert_eq!(seen[0].trailer, "7");
        assert_eq!(seen[0].payload, Some(json!({"viewers": 3})));
    }

    #[test]
    fn suppression_wins_over_edits() {
        let dispatcher = dispatcher_with(vec![Arc::new(Scripted::edit_and_suppress(json!(
            {"x": 1}
        )))]);

        let mut raw = RawMessage::message("t.1", r#"{"x":0}"#);
        assert!(dispatcher.handle(&mut raw));
        assert_eq!(raw.data.unwrap().message(), r#"{"x":0}"#);
    }

    #[test]
    fn edits_are_written_back() {
        let dispatcher =
            dispatcher_with(vec![Arc::new(Scripted::edit(json!({"x": 1, "y": [true]})))]);

        let mut raw = RawMessage::message("t.1", r#"{"x":0}"#);
        assert!(!dispatcher.handle(&mut raw));
        assert_eq!(
            raw.data.unwrap().message(),
            wire_codec::encode(&json!({"x": 1, "y": [true]})).unwrap()
        );
    }

    #[test]
    fn undecodable_payload_is_delivered_unchanged() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = dispatcher_with(vec![recorder.clone()]);

        let mut raw = RawMessage::message("t.1", "not json");
        assert!(!dispatcher.handle(&mut raw));
        assert_eq!(raw.data.unwrap().message(), "not json");

        let seen = recorder.messages();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].payload, None);
    }

    #[test]
    fn failing_observer_does_not_block_delivery() {
        let dispatcher = dispatcher_with(vec![
            Arc::new(Scripted::fail()),
            Arc::new(Scripted::edit(json!("after"))),
        ]);

        let mut raw = RawMessage::message("t", r#""before""#);
        assert!(!dispatcher.handle(&mut raw));
        assert_eq!(raw.data.unwrap().message(), r#""after""#);
    }
}
