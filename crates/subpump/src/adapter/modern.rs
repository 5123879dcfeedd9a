use std::sync::Arc;

use tracing::debug;
use wire_codec::RawMessage;

use crate::bus::EventBus;
use crate::host::{
    ListenHandler, ListenOptions, ListenerId, MessageHandler, ModernClient, TopicCallback,
    UnlistenHandler, MESSAGE_EVENT,
};
use crate::pipeline::Dispatcher;

/// Entry points bound on the client before installation.
pub(super) struct Originals {
    on_message: MessageHandler,
    listen: ListenHandler,
    unlisten: UnlistenHandler,
}

pub(super) fn install(
    client: &Arc<dyn ModernClient>,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<EventBus>,
) -> Originals {
    let originals = Originals {
        on_message: client.on_message(),
        listen: client.listen_handler(),
        unlisten: client.unlisten_handler(),
    };

    let on_message: MessageHandler = {
        let original = Arc::clone(&originals.on_message);
        Arc::new(move |raw: &mut RawMessage| {
            if dispatcher.handle(raw) {
                return;
            }
            original(raw)
        })
    };
    rebind_delivery(client.as_ref(), on_message);

    let weak = Arc::downgrade(client);

    let listen: ListenHandler = {
        let original = Arc::clone(&originals.listen);
        let weak = weak.clone();
        let bus = Arc::clone(&bus);
        Arc::new(move |opts: &ListenOptions, callback: TopicCallback| -> ListenerId {
            let Some(topic) = opts.topic.as_deref().filter(|t| !t.is_empty()) else {
                return original(opts, callback);
            };
            let client = weak.upgrade();
            let present = |c: &Option<Arc<dyn ModernClient>>| {
                c.as_ref().is_some_and(|c| c.has_topic_listeners(topic))
            };

            let had = present(&client);
            let out = original(opts, callback);
            if !had && present(&client) {
                bus.emit_add_topic(topic);
            }
            out
        })
    };
    client.set_listen_handler(listen);

    let unlisten: UnlistenHandler = {
        let original = Arc::clone(&originals.unlisten);
        Arc::new(move |topic: &str, id: ListenerId| -> bool {
            let client = weak.upgrade();
            let present = |c: &Option<Arc<dyn ModernClient>>| {
                c.as_ref().is_some_and(|c| c.has_topic_listeners(topic))
            };

            let had = present(&client);
            let out = original(topic, id);
            if had && !present(&client) {
                bus.emit_remove_topic(topic);
            }
            out
        })
    };
    client.set_unlisten_handler(unlisten);

    debug!("modern pubsub client hooked");
    originals
}

pub(super) fn restore(client: &dyn ModernClient, originals: Originals) {
    rebind_delivery(client, originals.on_message);
    client.set_listen_handler(originals.listen);
    client.set_unlisten_handler(originals.unlisten);
    debug!("modern pubsub client restored");
}

/// The transport holds its listener directly, so it has to be re-added
/// whenever the delivery entry point changes.
fn rebind_delivery(client: &dyn ModernClient, handler: MessageHandler) {
    let connection = client.connection();
    connection.remove_all_listeners(MESSAGE_EVENT);
    client.set_on_message(Arc::clone(&handler));
    connection.add_listener(MESSAGE_EVENT, handler);
}
