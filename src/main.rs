//! Bridge replay tool
//!
//! Builds the item trees from a configuration file, prints them, and replays
//! recorded deliveries (one JSON object per line) through the trees. Every
//! record asked to process runs a read cycle and logs what it read.
//!
//! ```text
//! uabridge <config.toml> [deliveries.jsonl]
//! ```

use anyhow::{bail, Context};
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uabridge::{
    connector::processing_channel,
    cycle::{read_cycle, CycleOutcome},
    BridgeConfig, Delivery, ProcessRequest, Registry, RegistryBuilder, TransportLink,
};

/// Transport stand-in: replay files carry all answers, requests are logged
struct ReplayTransport;

impl TransportLink for ReplayTransport {
    fn request_read(&self, item: &str) {
        tracing::info!("read requested for {}", item);
    }

    fn request_write(&self, item: &str) {
        tracing::info!("write requested for {}", item);
    }
}

fn run_consumers(
    registry: &Registry,
    transport: &ReplayTransport,
    requests: impl Iterator<Item = ProcessRequest>,
) {
    for request in requests {
        let Some(connector) = registry.connector(&request.record) else {
            tracing::warn!("request for unknown record {}", request.record);
            continue;
        };
        match read_cycle(connector, transport, |state| state.read_variant()) {
            CycleOutcome::Value(v) => tracing::info!("{} = {}", request.record, v),
            CycleOutcome::Failed(e) => tracing::warn!("{}: {}", request.record, e),
            CycleOutcome::Disconnected => tracing::warn!("{}: disconnected", request.record),
            other => tracing::debug!("{}: {:?}", request.record, other),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,uabridge=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        bail!("usage: uabridge <config.toml> [deliveries.jsonl]");
    };
    let replay_path = args.next();

    let config = BridgeConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path))?;

    let (tx, rx) = processing_channel();
    let registry = RegistryBuilder::from_config(&config, Arc::new(tx))
        .context("building item trees")?
        .build();
    print!("{}", registry.show(2));

    let transport = ReplayTransport;
    if let Some(path) = replay_path {
        let file = std::fs::File::open(&path).with_context(|| format!("opening {}", path))?;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("reading {}", path))?;
            if line.trim().is_empty() {
                continue;
            }
            let delivery: Delivery = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: malformed delivery", path, number + 1))?;
            let Some(item) = registry.item(&delivery.item) else {
                tracing::warn!("{}:{}: unknown item {}", path, number + 1, delivery.item);
                continue;
            };
            item.set_incoming(delivery.value.as_ref(), delivery.reason);
            run_consumers(&registry, &transport, rx.try_iter());
        }
    }

    registry.shutdown();
    tracing::info!(
        "Shutdown complete, {} consumers notified",
        rx.try_iter().count()
    );
    Ok(())
}
