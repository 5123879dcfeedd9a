//! Capability traits describing the hosted page and the two client shapes
//! found on it.
//!
//! The client is foreign code with no extension points. Each of its entry
//! points is modelled as a swappable handler slot: reading the slot yields
//! the handler currently bound, writing it rebinds the entry point. The
//! interception adapters wrap whatever is bound at install time.

use std::sync::Arc;

use wire_codec::RawMessage;

/// Event name the modern transport dispatches inbound frames under.
pub const MESSAGE_EVENT: &str = "message";

/// Identifies one subscription on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Message-delivery entry point.
pub type MessageHandler = Arc<dyn Fn(&mut RawMessage) + Send + Sync>;
/// Subscriber callback; receives the string-encoded payload of a frame.
pub type TopicCallback = Arc<dyn Fn(&str) + Send + Sync>;
/// Modern `listen(opts, fn)` entry point.
pub type ListenHandler = Arc<dyn Fn(&ListenOptions, TopicCallback) -> ListenerId + Send + Sync>;
/// Modern `unlisten(topic, fn)` entry point.
pub type UnlistenHandler = Arc<dyn Fn(&str, ListenerId) -> bool + Send + Sync>;
/// Legacy `on(topic, fn)` entry point.
pub type OnHandler = Arc<dyn Fn(&str, TopicCallback) -> ListenerId + Send + Sync>;
/// Legacy `off(topic, fn)` entry point.
pub type OffHandler = Arc<dyn Fn(&str, ListenerId) -> bool + Send + Sync>;

/// Options passed to a modern `listen` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenOptions {
    pub topic: Option<String>,
    pub auth_token: Option<String>,
}

impl ListenOptions {
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            auth_token: None,
        }
    }
}

/// The modern client's socket wrapper. It keeps direct references to its
/// listeners, so replacing `on_message` alone does not change what it calls.
pub trait Transport: Send + Sync {
    fn remove_all_listeners(&self, event: &str);
    fn add_listener(&self, event: &str, handler: MessageHandler);
}

/// The "new-style" singleton client.
pub trait ModernClient: Send + Sync {
    fn on_message(&self) -> MessageHandler;
    fn set_on_message(&self, handler: MessageHandler);
    fn connection(&self) -> &dyn Transport;

    fn listen_handler(&self) -> ListenHandler;
    fn set_listen_handler(&self, handler: ListenHandler);
    fn unlisten_handler(&self) -> UnlistenHandler;
    fn set_unlisten_handler(&self, handler: UnlistenHandler);

    /// Whether any listener is currently registered for `topic`.
    fn has_topic_listeners(&self, topic: &str) -> bool;
    /// Keys of the topic listener registry, or `None` if it is absent.
    fn topic_names(&self) -> Option<Vec<String>>;

    /// Feed a frame into the client as if the socket had received it.
    fn simulate_message(&self, topic: &str, message: String);
}

/// The topic emitter (`_listens`) of a legacy client.
pub trait LegacyListens: Send + Sync {
    fn on_handler(&self) -> OnHandler;
    fn set_on_handler(&self, handler: OnHandler);
    fn off_handler(&self) -> OffHandler;
    fn set_off_handler(&self, handler: OffHandler);

    fn has_listeners(&self, topic: &str) -> bool;
    fn event_names(&self) -> Option<Vec<String>>;

    /// Internal trigger used to synthesize a delivery for `topic`.
    fn trigger(&self, topic: &str, message: String);
}

/// The inner `_client` of an "old-style" registry instance.
pub trait LegacyClient: Send + Sync {
    fn on_message(&self) -> MessageHandler;
    fn set_on_message(&self, handler: MessageHandler);

    /// Attach the primary socket to the currently bound `on_message`.
    fn bind_primary(&self);
    /// Detach the primary socket from whatever handler it holds.
    fn unbind_primary(&self);

    fn listens(&self) -> Arc<dyn LegacyListens>;
}

/// One value of the legacy instance registry.
#[derive(Clone)]
pub struct RegistryEntry {
    pub id: String,
    /// The internal client reference; entries without one do not qualify.
    pub client: Option<Arc<dyn LegacyClient>>,
}

/// Read access to the two well-known global slots of the hosted page.
pub trait HostEnvironment: Send + Sync {
    /// The modern singleton slot.
    fn pubsub_client(&self) -> Option<Arc<dyn ModernClient>>;
    /// The legacy registry slot.
    fn pubsub_instances(&self) -> Option<Vec<RegistryEntry>>;
}
