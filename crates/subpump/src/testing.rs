//! Observers shared by the unit tests.

use std::sync::Mutex;

use serde_json::Value;

use crate::bus::PubSubObserver;
use crate::event::PubSubEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct Seen {
    pub prefix: String,
    pub trailer: String,
    /// `None` when the payload could not be decoded.
    pub payload: Option<Value>,
}

/// Records every notification it receives.
#[derive(Default)]
pub struct Recorder {
    messages: Mutex<Vec<Seen>>,
    topics: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn messages(&self) -> Vec<Seen> {
        self.messages.lock().unwrap().clone()
    }

    /// Topic notifications as `+topic` / `-topic`, in order.
    pub fn topic_log(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }
}

impl PubSubObserver for Recorder {
    fn on_message(&self, event: &mut PubSubEvent<'_>) -> anyhow::Result<()> {
        let payload = event.payload().ok().cloned();
        self.messages.lock().unwrap().push(Seen {
            prefix: event.prefix().to_string(),
            trailer: event.trailer().to_string(),
            payload,
        });
        Ok(())
    }

    fn on_add_topic(&self, topic: &str) {
        self.topics.lock().unwrap().push(format!("+{topic}"));
    }

    fn on_remove_topic(&self, topic: &str) {
        self.topics.lock().unwrap().push(format!("-{topic}"));
    }

    fn name(&self) -> &str {
        "recorder"
    }
}

/// Applies a fixed verdict to every message.
pub struct Scripted {
    replacement: Option<Value>,
    suppress: bool,
    fail: bool,
}

impl Scripted {
    pub fn edit(value: Value) -> Self {
        Self {
            replacement: Some(value),
            suppress: false,
            fail: false,
        }
    }

    pub fn edit_and_suppress(value: Value) -> Self {
        Self {
            suppress: true,
            ..Self::edit(value)
        }
    }

    pub fn suppress() -> Self {
        Self {
            replacement: None,
            suppress: true,
            fail: false,
        }
    }

    pub fn fail() -> Self {
        Self {
            replacement: None,
            suppress: false,
            fail: true,
        }
    }
}

impl PubSubObserver for Scripted {
    fn on_message(&self, event: &mut PubSubEvent<'_>) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("scripted failure");
        }
        if let Some(value) = &self.replacement {
            event.set_payload(value.clone());
        }
        if self.suppress {
            event.prevent_default();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
