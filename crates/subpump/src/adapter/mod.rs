//! Interception adapters.
//!
//! Installing an adapter rebinds three entry points of the located client:
//! message delivery (wrapped so the [`Dispatcher`] runs first and may skip
//! the original) and subscribe/unsubscribe (wrapped so topic presence
//! transitions are announced on the [`EventBus`]). Originals are kept so
//! [`Installed::restore`] can put them back.
//!
//! Installing twice on the same client stacks wrappers. [`crate::Subpump`]
//! holds at most one [`Installed`] at a time.

mod legacy;
mod modern;

use std::sync::Arc;

use crate::bus::EventBus;
use crate::locator::{ClientHandle, ClientKind};
use crate::pipeline::Dispatcher;

enum Originals {
    Modern(modern::Originals),
    Legacy(legacy::Originals),
}

/// A client with interception wrappers in place.
pub struct Installed {
    handle: ClientHandle,
    originals: Originals,
}

impl Installed {
    pub fn handle(&self) -> &ClientHandle {
        &self.handle
    }

    pub fn kind(&self) -> ClientKind {
        self.handle.kind()
    }

    pub fn is_legacy(&self) -> bool {
        self.handle.is_legacy()
    }

    /// Put back the entry points captured at install time.
    pub fn restore(self) -> ClientHandle {
        match (&self.handle, self.originals) {
            (ClientHandle::Modern(client), Originals::Modern(originals)) => {
                modern::restore(client.as_ref(), originals)
            }
            (ClientHandle::Legacy { client, .. }, Originals::Legacy(originals)) => {
                legacy::restore(client.as_ref(), originals)
            }
            _ => unreachable!("originals always match the handle they were captured from"),
        }
        self.handle
    }
}

/// Hook `handle`'s entry points.
pub fn install(handle: ClientHandle, dispatcher: Arc<Dispatcher>, bus: Arc<EventBus>) -> Installed {
    let originals = match &handle {
        ClientHandle::Modern(client) => {
            Originals::Modern(modern::install(client, dispatcher, bus))
        }
        ClientHandle::Legacy { client, instance_id } => {
            tracing::debug!(instance = %instance_id, "hooking legacy instance");
            Originals::Legacy(legacy::install(client.as_ref(), dispatcher, bus))
        }
    };
    Installed { handle, originals }
}
