use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::LocatorConfig;
use crate::error::DiscoveryFailure;
use crate::host::{HostEnvironment, LegacyClient, ModernClient};

/// Which client shape was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Modern,
    Legacy,
}

/// The one live client this crate hooks.
#[derive(Clone)]
pub enum ClientHandle {
    Modern(Arc<dyn ModernClient>),
    Legacy {
        /// Registry key of the chosen instance.
        instance_id: String,
        client: Arc<dyn LegacyClient>,
    },
}

impl ClientHandle {
    pub fn kind(&self) -> ClientKind {
        match self {
            ClientHandle::Modern(_) => ClientKind::Modern,
            ClientHandle::Legacy { .. } => ClientKind::Legacy,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.kind() == ClientKind::Legacy
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientHandle::Modern(_) => f.write_str("ClientHandle::Modern"),
            ClientHandle::Legacy { instance_id, .. } => f
                .debug_struct("ClientHandle::Legacy")
                .field("instance_id", instance_id)
                .finish(),
        }
    }
}

/// Result of a bounded discovery run.
#[derive(Debug)]
pub enum Discovery {
    Found(ClientHandle),
    NotFound(DiscoveryFailure),
}

/// Result of a single look at the global slots.
enum Probe {
    Found(ClientHandle),
    /// Neither slot exists yet.
    Absent,
    /// The registry exists but nothing in it qualifies.
    Unqualified { entries: usize },
}

/// Finds the live client on the hosted page, retrying while neither global
/// slot has been populated.
#[derive(Debug, Clone)]
pub struct Locator {
    config: LocatorConfig,
}

impl Locator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    /// Probe once, then up to `max_attempts` more times with a fixed delay
    /// in between. Never retries once it has given up.
    pub async fn locate(&self, env: &dyn HostEnvironment) -> Discovery {
        let mut retries = 0;

        loop {
            match probe(env) {
                Probe::Found(handle) => {
                    debug!(?handle, retries, "pubsub client located");
                    return Discovery::Found(handle);
                }
                Probe::Unqualified { entries } => {
                    let failure = DiscoveryFailure::NoQualifyingInstance { entries };
                    warn!(%failure, "pubsub discovery failed");
                    return Discovery::NotFound(failure);
                }
                Probe::Absent if retries >= self.config.max_attempts => {
                    let failure = DiscoveryFailure::GlobalsMissing { attempts: retries };
                    warn!(%failure, "pubsub discovery failed");
                    return Discovery::NotFound(failure);
                }
                Probe::Absent => {
                    retries += 1;
                    debug!(retries, "pubsub globals not present yet");
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
            }
        }
    }
}

fn probe(env: &dyn HostEnvironment) -> Probe {
    // The modern singleton is authoritative when present.
    if let Some(client) = env.pubsub_client() {
        return Probe::Found(ClientHandle::Modern(client));
    }

    let Some(entries) = env.pubsub_instances() else {
        return Probe::Absent;
    };

    let total = entries.len();
    let mut chosen: Option<ClientHandle> = None;
    for entry in entries {
        let Some(client) = entry.client else {
            continue;
        };
        if chosen.is_some() {
            warn!(
                instance = %entry.id,
                "multiple pubsub instances detected; only the first is hooked"
            );
            continue;
        }
        chosen = Some(ClientHandle::Legacy {
            instance_id: entry.id,
            client,
        });
    }

    match chosen {
        Some(handle) => Probe::Found(handle),
        None => Probe::Unqualified { entries: total },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::host::RegistryEntry;
    use crate::memory::{MemoryHost, MemoryLegacyClient, MemoryModernClient};

    fn locator(max_attempts: u32) -> Locator {
        Locator::new(LocatorConfig {
            max_attempts,
            retry_delay_ms: 50,
        })
    }

    fn legacy_entry(id: &str) -> RegistryEntry {
        RegistryEntry {
            id: id.to_string(),
            client: Some(MemoryLegacyClient::new()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn singleton_wins_over_registry() {
        let host = MemoryHost::new();
        host.publish_registry(vec![legacy_entry("a")]);
        host.publish_modern(MemoryModernClient::new());

        match locator(10).locate(&host).await {
            Discovery::Found(handle) => assert_eq!(handle.kind(), ClientKind::Modern),
            other => panic!("expected modern client, got {other:?}"),
        }
        assert_eq!(host.probe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn first_qualifying_registry_entry_wins() {
        let host = MemoryHost::new();
        host.publish_registry(vec![
            RegistryEntry {
                id: "empty".into(),
                client: None,
            },
            legacy_entry("first"),
            legacy_entry("second"),
        ]);

        match locator(10).locate(&host).await {
            Discovery::Found(ClientHandle::Legacy { instance_id, .. }) => {
                assert_eq!(instance_id, "first")
            }
            other => panic!("expected legacy client, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn registry_without_clients_fails_without_retrying() {
        let host = MemoryHost::new();
        host.publish_registry(vec![RegistryEntry {
            id: "x".into(),
            client: None,
        }]);

        match locator(10).locate(&host).await {
            Discovery::NotFound(failure) => {
                assert_eq!(failure, DiscoveryFailure::NoQualifyingInstance { entries: 1 })
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(host.probe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_globals_exhaust_exactly_the_retry_budget() {
        let host = MemoryHost::new();
        let start = tokio::time::Instant::now();

        match locator(10).locate(&host).await {
            Discovery::NotFound(failure) => {
                assert_eq!(failure, DiscoveryFailure::GlobalsMissing { attempts: 10 })
            }
            other => panic!("expected failure, got {other:?}"),
        }

        // One initial probe plus ten retries, 50ms apart.
        assert_eq!(host.probe_count(), 11);
        assert_eq!(start.elapsed(), Duration::from_millis(500));

        // Nothing keeps probing after the locator gave up.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(host.probe_count(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn client_appearing_during_retries_is_found() {
        let host = Arc::new(MemoryHost::new());
        let publisher = Arc::clone(&host);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            publisher.publish_modern(MemoryModernClient::new());
        });

        match locator(10).locate(host.as_ref()).await {
            Discovery::Found(handle) => assert_eq!(handle.kind(), ClientKind::Modern),
            other => panic!("expected modern client, got {other:?}"),
        }
        // Probes at 0, 50, 100 and 150ms.
        assert_eq!(host.probe_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_probes_once() {
        let host = MemoryHost::new();
        assert!(matches!(
            locator(0).locate(&host).await,
            Discovery::NotFound(DiscoveryFailure::GlobalsMissing { attempts: 0 })
        ));
        assert_eq!(host.probe_count(), 1);
    }
}
