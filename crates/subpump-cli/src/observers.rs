use std::sync::Arc;

use anyhow::Context;
use subpump::{PubSubEvent, PubSubObserver};
use topic_rules::{ResolvedAction, RuleEngine};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// RuleObserver
// ---------------------------------------------------------------------------

/// Applies a [`RuleEngine`] verdict to every message.
///
/// Payloads are only decoded when some rule looks at or edits them.
pub struct RuleObserver {
    engine: Arc<RuleEngine>,
}

impl RuleObserver {
    pub fn new(engine: Arc<RuleEngine>) -> Self {
        Self { engine }
    }
}

impl PubSubObserver for RuleObserver {
    fn on_message(&self, event: &mut PubSubEvent<'_>) -> anyhow::Result<()> {
        let payload = if self.engine.needs_payload() {
            event.payload().ok().cloned()
        } else {
            None
        };
        let decision = self.engine.evaluate(event.topic(), payload.as_ref());

        match decision.action {
            ResolvedAction::Pass => {}
            ResolvedAction::Log => {
                info!(
                    topic = %event.topic(),
                    rule = ?decision.matched_rule,
                    reason = %decision.reason,
                    "pubsub message flagged"
                );
            }
            ResolvedAction::Suppress => {
                info!(
                    topic = %event.topic(),
                    rule = ?decision.matched_rule,
                    reason = %decision.reason,
                    "pubsub message suppressed"
                );
                event.prevent_default();
            }
            ResolvedAction::Rewrite(edits) => {
                let Some(payload) = payload else {
                    warn!(
                        topic = %event.topic(),
                        rule = ?decision.matched_rule,
                        "cannot rewrite undecodable payload"
                    );
                    return Ok(());
                };
                let edited = topic_rules::apply_edits(&payload, &edits).with_context(|| {
                    format!("rule {:?} failed to rewrite payload", decision.matched_rule)
                })?;
                info!(
                    topic = %event.topic(),
                    rule = ?decision.matched_rule,
                    edits = edits.len(),
                    "pubsub message rewritten"
                );
                event.set_payload(edited);
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "topic-rules"
    }
}

// ---------------------------------------------------------------------------
// TopicLogger
// ---------------------------------------------------------------------------

/// Logs subscription churn.
pub struct TopicLogger;

impl PubSubObserver for TopicLogger {
    fn on_add_topic(&self, topic: &str) {
        info!(topic, "topic subscribed");
    }

    fn on_remove_topic(&self, topic: &str) {
        info!(topic, "topic unsubscribed");
    }

    fn name(&self) -> &str {
        "topic-logger"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use subpump::{Dispatcher, EventBus};
    use topic_rules::loader::load_rules_from_str;
    use wire_codec::RawMessage;

    use super::*;

    fn dispatcher(yaml: &str) -> Dispatcher {
        let engine = RuleEngine::new(load_rules_from_str(yaml).unwrap()).unwrap();
        let bus = Arc::new(EventBus::new());
        bus.register(Arc::new(RuleObserver::new(Arc::new(engine))));
        Dispatcher::new(bus)
    }

    fn message(raw: &RawMessage) -> Value {
        serde_json::from_str(raw.data.as_ref().unwrap().message()).unwrap()
    }

    const RULES: &str = r#"
version: "1.0"
rules:
  - name: "drop-ads"
    action: suppress
    matchers:
      - type: prefix
        pattern: "ads"
  - name: "hide-viewers"
    action: rewrite
    set:
      /viewers: 0
    matchers:
      - type: payload
        pointer: /type
        equals: "viewcount"
"#;

    #[test]
    fn suppress_rule_vetoes_delivery() {
        let dispatcher = dispatcher(RULES);
        let mut raw = RawMessage::message("ads.1", "{}");
        assert!(dispatcher.handle(&mut raw));
    }

    #[test]
    fn rewrite_rule_edits_payload() {
        let dispatcher = dispatcher(RULES);
        let mut raw = RawMessage::message("video-playback.1", r#"{"type":"viewcount","viewers":9}"#);

        assert!(!dispatcher.handle(&mut raw));
        assert_eq!(message(&raw), json!({"type": "viewcount", "viewers": 0}));
    }

    #[test]
    fn undecodable_payload_passes_untouched() {
        let dispatcher = dispatcher(
            r#"
version: "1.0"
rules:
  - name: "rewrite-all"
    action: rewrite
    set:
      /x: 1
"#,
        );
        let mut raw = RawMessage::message("t", "not json");

        assert!(!dispatcher.handle(&mut raw));
        assert_eq!(raw.data.as_ref().unwrap().message(), "not json");
    }

    #[test]
    fn failed_rewrite_leaves_message_unchanged() {
        let dispatcher = dispatcher(
            r#"
version: "1.0"
rules:
  - name: "deep"
    action: rewrite
    set:
      /missing/deep: 1
"#,
        );
        let mut raw = RawMessage::message("t", r#"{"a":1}"#);

        assert!(!dispatcher.handle(&mut raw));
        assert_eq!(raw.data.as_ref().unwrap().message(), r#"{"a":1}"#);
    }
}
