//! In-process stand-ins for the hosted page and both client shapes.
//!
//! They reproduce the parts of the foreign client that interception relies
//! on: a transport that keeps direct listener references, a primary socket
//! that must be rebound, topic listener registries and swappable entry
//! points. Every frame that reaches the client's own delivery logic is
//! recorded in a [`DeliveryLog`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, trace};
use wire_codec::RawMessage;

use crate::host::{
    HostEnvironment, LegacyClient, LegacyListens, ListenHandler, ListenOptions, ListenerId,
    MessageHandler, ModernClient, OffHandler, OnHandler, RegistryEntry, TopicCallback, Transport,
    UnlistenHandler, MESSAGE_EVENT,
};

fn read<T: Clone>(slot: &RwLock<T>) -> T {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write<T>(slot: &RwLock<T>, value: T) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = value;
}

/// Topic → listeners map. Topics with no listeners left are removed.
#[derive(Default)]
pub struct TopicRegistry {
    next_id: AtomicU64,
    topics: Mutex<BTreeMap<String, Vec<(ListenerId, TopicCallback)>>>,
}

impl TopicRegistry {
    pub fn add(&self, topic: &str, callback: TopicCallback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.lock()
            .entry(topic.to_string())
            .or_default()
            .push((id, callback));
        id
    }

    pub fn remove(&self, topic: &str, id: ListenerId) -> bool {
        let mut topics = self.lock();
        let Some(listeners) = topics.get_mut(topic) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            topics.remove(topic);
        }
        removed
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.lock().contains_key(topic)
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Invoke every listener of `topic` with `message`.
    pub fn emit(&self, topic: &str, message: &str) -> usize {
        let callbacks: Vec<TopicCallback> = self
            .lock()
            .get(topic)
            .map(|listeners| listeners.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        for callback in &callbacks {
            callback(message);
        }
        callbacks.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<(ListenerId, TopicCallback)>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Frames that reached a client's own delivery logic, in arrival order.
#[derive(Default)]
pub struct DeliveryLog {
    frames: Mutex<Vec<RawMessage>>,
}

impl DeliveryLog {
    pub fn record(&self, raw: &RawMessage) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(raw.clone());
    }

    pub fn frames(&self) -> Vec<RawMessage> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Original delivery logic shared by both client shapes: log the frame and
/// fan structured messages out to the topic's listeners.
fn deliver(log: &DeliveryLog, registry: &TopicRegistry, raw: &mut RawMessage) {
    log.record(raw);
    if let Some(data) = raw.structured() {
        let listeners = registry.emit(data.topic(), data.message());
        trace!(topic = %data.topic(), listeners, "frame delivered");
    }
}

// ---------------------------------------------------------------------------
// Modern client
// ---------------------------------------------------------------------------

/// Event emitter standing in for the modern client's socket wrapper.
#[derive(Default)]
pub struct MemoryTransport {
    listeners: Mutex<HashMap<String, Vec<MessageHandler>>>,
}

impl MemoryTransport {
    /// Dispatch `raw` to every listener of `event`, in insertion order.
    pub fn emit(&self, event: &str, raw: &mut RawMessage) {
        let handlers: Vec<MessageHandler> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            debug!(event, "transport event has no listeners; frame dropped");
        }
        for handler in &handlers {
            handler(raw);
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map_or(0, Vec::len)
    }
}

impl Transport for MemoryTransport {
    fn remove_all_listeners(&self, event: &str) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(event);
    }

    fn add_listener(&self, event: &str, handler: MessageHandler) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }
}

/// The "new-style" client.
pub struct MemoryModernClient {
    on_message: RwLock<MessageHandler>,
    listen: RwLock<ListenHandler>,
    unlisten: RwLock<UnlistenHandler>,
    transport: MemoryTransport,
    topics: Arc<TopicRegistry>,
    log: Arc<DeliveryLog>,
}

impl MemoryModernClient {
    pub fn new() -> Arc<Self> {
        let topics = Arc::new(TopicRegistry::default());
        let log = Arc::new(DeliveryLog::default());

        let on_message: MessageHandler = {
            let topics = Arc::clone(&topics);
            let log = Arc::clone(&log);
            Arc::new(move |raw: &mut RawMessage| deliver(&log, &topics, raw))
        };
        let listen: ListenHandler = {
            let topics = Arc::clone(&topics);
            Arc::new(move |opts: &ListenOptions, callback: TopicCallback| match &opts.topic {
                Some(topic) => topics.add(topic, callback),
                None => ListenerId(0),
            })
        };
        let unlisten: UnlistenHandler = {
            let topics = Arc::clone(&topics);
            Arc::new(move |topic: &str, id: ListenerId| topics.remove(topic, id))
        };

        let transport = MemoryTransport::default();
        transport.add_listener(MESSAGE_EVENT, Arc::clone(&on_message));

        Arc::new(Self {
            on_message: RwLock::new(on_message),
            listen: RwLock::new(listen),
            unlisten: RwLock::new(unlisten),
            transport,
            topics,
            log,
        })
    }

    /// A frame arriving from the network.
    pub fn receive(&self, mut raw: RawMessage) {
        self.transport.emit(MESSAGE_EVENT, &mut raw);
    }

    /// Subscribe through whatever `listen` entry point is currently bound.
    pub fn listen(&self, topic: &str, callback: TopicCallback) -> ListenerId {
        let handler = self.listen_handler();
        handler(&ListenOptions::topic(topic), callback)
    }

    /// Unsubscribe through whatever `unlisten` entry point is currently bound.
    pub fn unlisten(&self, topic: &str, id: ListenerId) -> bool {
        let handler = self.unlisten_handler();
        handler(topic, id)
    }

    pub fn delivered(&self) -> Vec<RawMessage> {
        self.log.frames()
    }

    pub fn transport(&self) -> &MemoryTransport {
        &self.transport
    }
}

impl ModernClient for MemoryModernClient {
    fn on_message(&self) -> MessageHandler {
        read(&self.on_message)
    }

    fn set_on_message(&self, handler: MessageHandler) {
        write(&self.on_message, handler);
    }

    fn connection(&self) -> &dyn Transport {
        &self.transport
    }

    fn listen_handler(&self) -> ListenHandler {
        read(&self.listen)
    }

    fn set_listen_handler(&self, handler: ListenHandler) {
        write(&self.listen, handler);
    }

    fn unlisten_handler(&self) -> UnlistenHandler {
        read(&self.unlisten)
    }

    fn set_unlisten_handler(&self, handler: UnlistenHandler) {
        write(&self.unlisten, handler);
    }

    fn has_topic_listeners(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    fn topic_names(&self) -> Option<Vec<String>> {
        Some(self.topics.names())
    }

    fn simulate_message(&self, topic: &str, message: String) {
        self.receive(RawMessage::message(topic, message));
    }
}

// ---------------------------------------------------------------------------
// Legacy client
// ---------------------------------------------------------------------------

/// The legacy client's primary socket. It captures the delivery handler at
/// bind time and keeps calling that one until rebound.
#[derive(Default)]
pub struct PrimarySocket {
    bound: Mutex<Option<MessageHandler>>,
}

impl PrimarySocket {
    pub fn bind(&self, handler: MessageHandler) {
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub fn unbind(&self) {
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_bound(&self) -> bool {
        self.bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn receive(&self, mut raw: RawMessage) {
        let handler = self
            .bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handler {
            Some(handler) => handler(&mut raw),
            None => debug!("primary socket unbound; frame dropped"),
        }
    }
}

/// Topic emitter of a legacy client.
pub struct MemoryLegacyListens {
    on: RwLock<OnHandler>,
    off: RwLock<OffHandler>,
    topics: Arc<TopicRegistry>,
    socket: Arc<PrimarySocket>,
}

impl MemoryLegacyListens {
    fn new(topics: Arc<TopicRegistry>, socket: Arc<PrimarySocket>) -> Self {
        let on: OnHandler = {
            let topics = Arc::clone(&topics);
            Arc::new(move |topic: &str, callback: TopicCallback| topics.add(topic, callback))
        };
        let off: OffHandler = {
            let topics = Arc::clone(&topics);
            Arc::new(move |topic: &str, id: ListenerId| topics.remove(topic, id))
        };
        Self {
            on: RwLock::new(on),
            off: RwLock::new(off),
            topics,
            socket,
        }
    }

    /// Subscribe through whatever `on` entry point is currently bound.
    pub fn on(&self, topic: &str, callback: TopicCallback) -> ListenerId {
        let handler = self.on_handler();
        handler(topic, callback)
    }

    /// Unsubscribe through whatever `off` entry point is currently bound.
    pub fn off(&self, topic: &str, id: ListenerId) -> bool {
        let handler = self.off_handler();
        handler(topic, id)
    }
}

impl LegacyListens for MemoryLegacyListens {
    fn on_handler(&self) -> OnHandler {
        read(&self.on)
    }

    fn set_on_handler(&self, handler: OnHandler) {
        write(&self.on, handler);
    }

    fn off_handler(&self) -> OffHandler {
        read(&self.off)
    }

    fn set_off_handler(&self, handler: OffHandler) {
        write(&self.off, handler);
    }

    fn has_listeners(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    fn event_names(&self) -> Option<Vec<String>> {
        Some(self.topics.names())
    }

    /// Synthesized deliveries enter through the primary socket so they take
    /// the same path as network frames.
    fn trigger(&self, topic: &str, message: String) {
        self.socket.receive(RawMessage::message(topic, message));
    }
}

/// The inner client of an "old-style" registry instance.
pub struct MemoryLegacyClient {
    on_message: RwLock<MessageHandler>,
    socket: Arc<PrimarySocket>,
    listens: Arc<MemoryLegacyListens>,
    log: Arc<DeliveryLog>,
}

impl MemoryLegacyClient {
    pub fn new() -> Arc<Self> {
        let topics = Arc::new(TopicRegistry::default());
        let log = Arc::new(DeliveryLog::default());
        let socket = Arc::new(PrimarySocket::default());

        let on_message: MessageHandler = {
            let topics = Arc::clone(&topics);
            let log = Arc::clone(&log);
            Arc::new(move |raw: &mut RawMessage| deliver(&log, &topics, raw))
        };
        socket.bind(Arc::clone(&on_message));

        Arc::new(Self {
            on_message: RwLock::new(on_message),
            listens: Arc::new(MemoryLegacyListens::new(topics, Arc::clone(&socket))),
            socket,
            log,
        })
    }

    /// A frame arriving from the network.
    pub fn receive(&self, raw: RawMessage) {
        self.socket.receive(raw);
    }

    pub fn memory_listens(&self) -> &MemoryLegacyListens {
        &self.listens
    }

    pub fn socket(&self) -> &PrimarySocket {
        &self.socket
    }

    pub fn delivered(&self) -> Vec<RawMessage> {
        self.log.frames()
    }
}

impl LegacyClient for MemoryLegacyClient {
    fn on_message(&self) -> MessageHandler {
        read(&self.on_message)
    }

    fn set_on_message(&self, handler: MessageHandler) {
        write(&self.on_message, handler);
    }

    fn bind_primary(&self) {
        self.socket.bind(self.on_message());
    }

    fn unbind_primary(&self) {
        self.socket.unbind();
    }

    fn listens(&self) -> Arc<dyn LegacyListens> {
        self.listens.clone()
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Hosted page with the two global slots, initially empty.
#[derive(Default)]
pub struct MemoryHost {
    modern: RwLock<Option<Arc<dyn ModernClient>>>,
    registry: RwLock<Option<Vec<RegistryEntry>>>,
    probes: AtomicUsize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_modern(&self, client: Arc<dyn ModernClient>) {
        write(&self.modern, Some(client));
    }

    pub fn publish_registry(&self, entries: Vec<RegistryEntry>) {
        write(&self.registry, Some(entries));
    }

    /// Number of times the host has been probed for a client.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl HostEnvironment for MemoryHost {
    fn pubsub_client(&self) -> Option<Arc<dyn ModernClient>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        read(&self.modern)
    }

    fn pubsub_instances(&self) -> Option<Vec<RegistryEntry>> {
        read(&self.registry)
    }
}
