//! Observer bus for interception notifications.
//!
//! Three notifications leave this crate:
//!
//! - `pubsub-message`: delivered synchronously to every registered
//!   [`PubSubObserver`] in registration order, each able to edit or veto
//!   the [`PubSubEvent`].
//! - `add-topic` / `remove-topic`: delivered to the observers and also
//!   broadcast as [`TopicChange`] values for async consumers.
//!
//! A failing or panicking observer is logged and skipped; the remaining
//! observers still run and message delivery continues.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::event::PubSubEvent;

/// Capacity of the topic-change broadcast channel.
const TOPIC_CHANNEL_CAPACITY: usize = 256;

/// Receives interception notifications.
///
/// Observers run inside the client's delivery path, so a slow observer
/// stalls delivery. They must not block.
pub trait PubSubObserver: Send + Sync {
    /// Inspect, edit or veto one inbound message.
    fn on_message(&self, event: &mut PubSubEvent<'_>) -> anyhow::Result<()> {
        let _ = event;
        Ok(())
    }

    /// A topic gained its first listener.
    fn on_add_topic(&self, _topic: &str) {}

    /// A topic lost its last listener.
    fn on_remove_topic(&self, _topic: &str) {}

    /// Short name used in log fields.
    fn name(&self) -> &str;
}

/// A change in the set of subscribed topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicChange {
    Added(String),
    Removed(String),
}

/// Ordered fan-out of notifications to observers.
pub struct EventBus {
    observers: RwLock<Vec<Arc<dyn PubSubObserver>>>,
    topic_tx: broadcast::Sender<TopicChange>,
}

impl EventBus {
    pub fn new() -> Self {
        let (topic_tx, _) = broadcast::channel(TOPIC_CHANNEL_CAPACITY);
        Self {
            observers: RwLock::new(Vec::new()),
            topic_tx,
        }
    }

    /// Append an observer. Observers are notified in registration order.
    pub fn register(&self, observer: Arc<dyn PubSubObserver>) {
        debug!(observer = observer.name(), "observer registered");
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Follow topic additions and removals.
    pub fn subscribe_topics(&self) -> broadcast::Receiver<TopicChange> {
        self.topic_tx.subscribe()
    }

    /// Publish `pubsub-message`.
    pub fn publish_message(&self, event: &mut PubSubEvent<'_>) {
        for observer in self.snapshot() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| observer.on_message(event)));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(
                        observer = observer.name(),
                        topic = %event.topic(),
                        error = %err,
                        "observer failed on pubsub message"
                    );
                }
                Err(_) => {
                    error!(
                        observer = observer.name(),
                        topic = %event.topic(),
                        "observer panicked on pubsub message"
                    );
                }
            }
        }
    }

    /// Publish `add-topic`.
    pub fn emit_add_topic(&self, topic: &str) {
        debug!(topic, "topic added");
        self.notify(topic, |observer| observer.on_add_topic(topic));
        let _ = self.topic_tx.send(TopicChange::Added(topic.to_string()));
    }

    /// Publish `remove-topic`.
    pub fn emit_remove_topic(&self, topic: &str) {
        debug!(topic, "topic removed");
        self.notify(topic, |observer| observer.on_remove_topic(topic));
        let _ = self.topic_tx.send(TopicChange::Removed(topic.to_string()));
    }

    fn notify(&self, topic: &str, f: impl Fn(&dyn PubSubObserver)) {
        for observer in self.snapshot() {
            if panic::catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))).is_err() {
                error!(observer = observer.name(), topic, "observer panicked on topic change");
            }
        }
    }

    // Observers may register further observers from inside a callback, so
    // the lock is never held while one runs.
    fn snapshot(&self) -> Vec<Arc<dyn PubSubObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
