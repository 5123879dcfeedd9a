//! Interception and dispatch layer for an embedded pubsub client.
//!
//! The client lives on a hosted page that this crate does not control. It
//! is found through a [`HostEnvironment`] probe, its message-delivery and
//! subscribe/unsubscribe entry points are rebound, and every structured
//! inbound message is turned into a mutable [`PubSubEvent`] that registered
//! [`PubSubObserver`]s may edit or veto before the client sees it.
//!
//! # Architecture
//!
//! ```text
//! network ──> client transport ──> [wrapper] ──> client delivery
//!                                      |
//!                                 Dispatcher
//!                                      |
//!                                  EventBus ──> observers
//! ```
//!
//! Everything fails open: an observer error, a malformed payload or an
//! internal failure is logged and the client behaves as if unhooked.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use subpump::memory::{MemoryHost, MemoryModernClient};
//! use subpump::{ClientKind, Subpump};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let host = MemoryHost::new();
//! let client = MemoryModernClient::new();
//! host.publish_modern(client.clone());
//!
//! let subpump = Subpump::default();
//! assert_eq!(subpump.enable(&host).await, Some(ClientKind::Modern));
//!
//! subpump.inject("video-playback.42", &json!({"viewers": 7})).unwrap();
//! assert_eq!(client.delivered().len(), 1);
//! # }
//! ```

pub mod adapter;
pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod locator;
pub mod memory;
pub mod module;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use adapter::{install, Installed};
pub use bus::{EventBus, PubSubObserver, TopicChange};
pub use config::{LocatorConfig, SubpumpConfig};
pub use error::{DiscoveryFailure, NoInstanceError};
pub use event::{EventOutcome, PubSubEvent};
pub use host::{
    HostEnvironment, LegacyClient, LegacyListens, ListenOptions, ListenerId, ModernClient,
    RegistryEntry, Transport,
};
pub use locator::{ClientHandle, ClientKind, Discovery, Locator};
pub use module::Subpump;
pub use pipeline::{Dispatcher, PipelineError};
