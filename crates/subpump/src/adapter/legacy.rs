use std::sync::Arc;

use tracing::debug;
use wire_codec::RawMessage;

use crate::bus::EventBus;
use crate::host::{
    LegacyClient, LegacyListens, ListenerId, MessageHandler, OffHandler, OnHandler,
    TopicCallback,
};
use crate::pipeline::Dispatcher;

pub(super) struct Originals {
    on_message: MessageHandler,
    on: OnHandler,
    off: OffHandler,
}

pub(super) fn install(
    client: &dyn LegacyClient,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<EventBus>,
) -> Originals {
    let listens = client.listens();
    let originals = Originals {
        on_message: client.on_message(),
        on: listens.on_handler(),
        off: listens.off_handler(),
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
    rebind_delivery(client, on_message);

    let weak = Arc::downgrade(&listens);

    let on: OnHandler = {
        let original = Arc::clone(&originals.on);
        let weak = weak.clone();
        let bus = Arc::clone(&bus);
        Arc::new(move |topic: &str, callback: TopicCallback| -> ListenerId {
            let listens = weak.upgrade();
            let present = |l: &Option<Arc<dyn LegacyListens>>| {
                l.as_ref().is_some_and(|l| l.has_listeners(topic))
            };

            let had = present(&listens);
            let out = original(topic, callback);
            if !had && !topic.is_empty() && present(&listens) {
                bus.emit_add_topic(topic);
            }
            out
        })
    };
    listens.set_on_handler(on);

    let off: OffHandler = {
        let original = Arc::clone(&originals.off);
        Arc::new(move |topic: &str, id: ListenerId| -> bool {
            let listens = weak.upgrade();
            let present = |l: &Option<Arc<dyn LegacyListens>>| {
                l.as_ref().is_some_and(|l| l.has_listeners(topic))
            };

            let had = present(&listens);
            let out = original(topic, id);
            if had && !topic.is_empty() && !present(&listens) {
                bus.emit_remove_topic(topic);
            }
            out
        })
    };
    listens.set_off_handler(off);

    debug!("legacy pubsub client hooked");
    originals
}

pub(super) fn restore(client: &dyn LegacyClient, originals: Originals) {
    rebind_delivery(client, originals.on_message);
    let listens = client.listens();
    listens.set_on_handler(originals.on);
    listens.set_off_handler(originals.off);
    debug!("legacy pubsub client restored");
}

/// The primary socket captures the delivery entry point when bound.
fn rebind_delivery(client: &dyn LegacyClient, handler: MessageHandler) {
    client.unbind_primary();
    client.set_on_message(handler);
    client.bind_primary();
}
