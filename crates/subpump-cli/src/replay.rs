use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use subpump::host::{LegacyClient, TopicCallback};
use subpump::memory::{MemoryHost, MemoryLegacyClient, MemoryModernClient};
use subpump::{ListenerId, RegistryEntry};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use wire_codec::RawMessage;

use crate::config::{Flavor, HostConfig};

/// The emulated client that replayed frames are fed into.
pub enum ReplayTarget {
    Modern(Arc<MemoryModernClient>),
    /// Every published registry instance; frames go to the first.
    Legacy(Vec<Arc<MemoryLegacyClient>>),
}

impl ReplayTarget {
    pub fn build(config: &HostConfig) -> Self {
        match config.flavor {
            Flavor::Modern => ReplayTarget::Modern(MemoryModernClient::new()),
            Flavor::Legacy => {
                let count = config.instances.len().max(1);
                ReplayTarget::Legacy((0..count).map(|_| MemoryLegacyClient::new()).collect())
            }
        }
    }

    /// Put the client into its global slot, after `delay` if non-zero.
    pub fn publish(&self, host: &Arc<MemoryHost>, config: &HostConfig) {
        let publish = self.publisher(config);
        let delay = Duration::from_millis(config.publish_delay_ms);
        if delay.is_zero() {
            publish(host.as_ref());
            return;
        }

        let host = Arc::clone(host);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            publish(host.as_ref());
        });
    }

    fn publisher(&self, config: &HostConfig) -> Box<dyn FnOnce(&MemoryHost) + Send> {
        match self {
            ReplayTarget::Modern(client) => {
                let client = Arc::clone(client);
                Box::new(move |host: &MemoryHost| {
                    host.publish_modern(client);
                    debug!("modern client published");
                })
            }
            ReplayTarget::Legacy(clients) => {
                let entries: Vec<RegistryEntry> = clients
                    .iter()
                    .enumerate()
                    .map(|(idx, client)| RegistryEntry {
                        id: config
                            .instances
                            .get(idx)
                            .cloned()
                            .unwrap_or_else(|| format!("instance-{idx}")),
                        client: Some(Arc::clone(client) as Arc<dyn LegacyClient>),
                    })
                    .collect();
                Box::new(move |host: &MemoryHost| {
                    debug!(instances = entries.len(), "legacy registry published");
                    host.publish_registry(entries);
                })
            }
        }
    }

    pub fn listen(&self, topic: &str, callback: TopicCallback) -> Option<ListenerId> {
        match self {
            ReplayTarget::Modern(client) => Some(client.listen(topic, callback)),
            ReplayTarget::Legacy(clients) => clients
                .first()
                .map(|client| client.memory_listens().on(topic, callback)),
        }
    }

    pub fn receive(&self, raw: RawMessage) {
        match self {
            ReplayTarget::Modern(client) => client.receive(raw),
            ReplayTarget::Legacy(clients) => {
                if let Some(client) = clients.first() {
                    client.receive(raw);
                }
            }
        }
    }

    /// Frames that reached the client's own delivery logic.
    pub fn delivered(&self) -> Vec<RawMessage> {
        match self {
            ReplayTarget::Modern(client) => client.delivered(),
            ReplayTarget::Legacy(clients) => clients
                .first()
                .map(|client| client.delivered())
                .unwrap_or_default(),
        }
    }
}

/// Open `path` for line reading; `-` is stdin.
pub async fn open_input(path: &Path) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open input file: {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Feed every frame from `input` into `target`. Blank lines are skipped and
/// malformed ones logged and skipped. Returns the number of frames replayed.
pub async fn replay_frames(
    input: impl AsyncBufRead + Unpin,
    target: &ReplayTarget,
) -> Result<usize> {
    let mut lines = input.lines();
    let mut line_no = 0usize;
    let mut replayed = 0usize;

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match wire_codec::parse_frame(line) {
            Ok(raw) => {
                target.receive(raw);
                replayed += 1;
            }
            Err(err) => warn!(line = line_no, %err, "skipping malformed frame"),
        }
    }

    info!(replayed, "input replayed");
    Ok(replayed)
}
