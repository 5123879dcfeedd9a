use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, error, info};

use crate::adapter::{self, Installed};
use crate::bus::{EventBus, PubSubObserver};
use crate::config::SubpumpConfig;
use crate::error::NoInstanceError;
use crate::host::HostEnvironment;
use crate::locator::{ClientHandle, ClientKind, Discovery, Locator};
use crate::pipeline::Dispatcher;

/// Owns the one hooked pubsub client and exposes injection and topic
/// introspection on top of it.
pub struct Subpump {
    bus: Arc<EventBus>,
    dispatcher: Arc<Dispatcher>,
    locator: Locator,
    active: Mutex<Option<Installed>>,
    // Serializes enable calls so two discoveries never both install.
    enable_lock: tokio::sync::Mutex<()>,
}

impl Subpump {
    pub fn new(config: SubpumpConfig) -> Self {
        let bus = Arc::new(EventBus::new());
        Self {
            dispatcher: Arc::new(Dispatcher::new(Arc::clone(&bus))),
            bus,
            locator: Locator::new(config.locator),
            active: Mutex::new(None),
            enable_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Shorthand for `bus().register(..)`.
    pub fn register(&self, observer: Arc<dyn PubSubObserver>) {
        self.bus.register(observer);
    }

    /// Locate the client and install the interception wrappers.
    ///
    /// Returns the kind of client hooked, or `None` when discovery failed;
    /// failures are logged and leave the client untouched. Calling this
    /// while a client is already hooked does nothing.
    pub async fn enable(&self, env: &dyn HostEnvironment) -> Option<ClientKind> {
        let _guard = self.enable_lock.lock().await;

        if let Some(kind) = self.client_kind() {
            debug!(?kind, "pubsub already hooked; enable ignored");
            return Some(kind);
        }

        let handle = match self.locator.locate(env).await {
            Discovery::Found(handle) => handle,
            Discovery::NotFound(_) => return None,
        };

        let installed = adapter::install(
            handle,
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.bus),
        );
        let kind = installed.kind();
        *self.active() = Some(installed);

        info!(?kind, "pubsub interception enabled");
        Some(kind)
    }

    /// Restore the hooked client's entry points and forget it. Returns
    /// whether a client was hooked.
    pub fn disable(&self) -> bool {
        let Some(installed) = self.active().take() else {
            return false;
        };
        let kind = installed.kind();
        installed.restore();
        info!(?kind, "pubsub interception disabled");
        true
    }

    pub fn client_kind(&self) -> Option<ClientKind> {
        self.active().as_ref().map(Installed::kind)
    }

    pub fn is_legacy(&self) -> bool {
        self.client_kind() == Some(ClientKind::Legacy)
    }

    /// Deliver `message` on `topic` as if it had arrived from the network.
    ///
    /// The frame goes through the installed wrappers, so observers see it
    /// like any other inbound message.
    pub fn inject(&self, topic: &str, message: &Value) -> Result<(), NoInstanceError> {
        let handle = self.handle().ok_or(NoInstanceError)?;

        let encoded = match wire_codec::encode(message) {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(topic, %err, "unable to encode injected message");
                return Ok(());
            }
        };

        debug!(topic, "injecting pubsub message");
        match handle {
            ClientHandle::Modern(client) => client.simulate_message(topic, encoded),
            ClientHandle::Legacy { client, .. } => client.listens().trigger(topic, encoded),
        }
        Ok(())
    }

    /// Topics with at least one listener on the hooked client. Empty when
    /// nothing is hooked or the client exposes no registry.
    pub fn topics(&self) -> Vec<String> {
        let names = match self.handle() {
            Some(ClientHandle::Modern(client)) => client.topic_names(),
            Some(ClientHandle::Legacy { client, .. }) => client.listens().event_names(),
            None => None,
        };
        names.unwrap_or_default()
    }

    // Cloned out so the lock is released before calling into the client;
    // observers triggered by that call may come back into this type.
    fn handle(&self) -> Option<ClientHandle> {
        self.active().as_ref().map(|installed| installed.handle().clone())
    }

    fn active(&self) -> MutexGuard<'_, Option<Installed>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Subpump {
    fn default() -> Self {
        Self::new(SubpumpConfig::default())
    }
}
