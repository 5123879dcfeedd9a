mod cli;
mod config;
mod observers;
mod replay;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use subpump::memory::MemoryHost;
use subpump::{Subpump, SubpumpConfig, TopicChange};
use topic_rules::RuleEngine;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::observers::{RuleObserver, TopicLogger};
use crate::replay::ReplayTarget;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref rules) = cli.rules {
        cfg.rules_file = Some(rules.clone());
    }
    if let Some(flavor) = cli.flavor {
        cfg.host.flavor = flavor;
    }
    if let Some(ref level) = cli.log_level {
        cfg.logging.level = level.clone();
    }

    // 3. Init tracing-subscriber with JSON format. Stdout carries the
    //    delivered frames, so logs go to stderr.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(
        config_file = %cli.config.display(),
        flavor = ?cfg.host.flavor,
        max_attempts = cfg.locator.max_attempts,
        "subpump starting"
    );

    // 4. Load topic rules.
    let engine = match &cfg.rules_file {
        Some(path) => {
            let rules = topic_rules::loader::load_rules(path).context("failed to load rule file")?;
            let engine = RuleEngine::new(rules).context("failed to initialize rule engine")?;
            info!(rules_file = %path.display(), ?engine, "rule engine loaded");
            Some(Arc::new(engine))
        }
        None => None,
    };

    // 5. Build the interception layer and its observers.
    let subpump = Subpump::new(SubpumpConfig {
        locator: cfg.locator,
    });
    subpump.register(Arc::new(TopicLogger));
    if let Some(engine) = engine {
        subpump.register(Arc::new(RuleObserver::new(engine)));
    }
    let mut topic_changes = subpump.bus().subscribe_topics();

    info!(observers = subpump.bus().observer_count(), "observer chain built");

    // 6. Emulate the hosted page and hook its client.
    let host = Arc::new(MemoryHost::new());
    let target = ReplayTarget::build(&cfg.host);
    target.publish(&host, &cfg.host);

    match subpump.enable(host.as_ref()).await {
        Some(kind) => info!(?kind, "client hooked"),
        None => warn!("no client hooked; frames are replayed without interception"),
    }

    for topic in &cli.subscribe {
        let subscribed = topic.clone();
        target.listen(
            topic,
            Arc::new(move |message: &str| {
                debug!(topic = %subscribed, payload = message, "listener received message");
            }),
        );
    }

    // 7. Replay frames until the input ends or ctrl-c arrives.
    if let Some(path) = &cli.input {
        let input = replay::open_input(path).await?;
        tokio::select! {
            r = replay::replay_frames(input, &target) => {
                r?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT (ctrl-c); stopping replay");
            }
        }
    }

    // 8. Injections go through the hooked client.
    for injection in &cli.inject {
        if let Err(err) = subpump.inject(&injection.topic, &injection.message) {
            warn!(topic = %injection.topic, %err, "injection skipped");
        }
    }

    // 9. Emit every frame the client delivered.
    let mut stdout = std::io::stdout().lock();
    let delivered = target.delivered();
    for frame in &delivered {
        let line = wire_codec::render_frame(frame).context("failed to render frame")?;
        writeln!(stdout, "{line}").context("failed to write to stdout")?;
    }
    stdout.flush().context("failed to flush stdout")?;

    let (mut added, mut removed) = (0usize, 0usize);
    while let Ok(change) = topic_changes.try_recv() {
        match change {
            TopicChange::Added(_) => added += 1,
            TopicChange::Removed(_) => removed += 1,
        }
    }

    info!(
        delivered = delivered.len(),
        topics = ?subpump.topics(),
        topics_added = added,
        topics_removed = removed,
        "subpump finished"
    );

    Ok(())
}
