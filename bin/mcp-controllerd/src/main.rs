mod cli;

use std::sync::Arc;

use chrono::Duration;
use clap::Parser;
use cli::Args;
use mcp_controller::Dispatcher;
use mcp_rollout::{Pod, PodSource};
use mcp_store::{MemoryStore, ObjectStore};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// No pod-eviction backend is wired into this reference daemon; every node
/// drains as if it carries no pods at all. A real deployment supplies a
/// [`PodSource`] backed by its own fleet inventory.
struct NoPods;

impl PodSource for NoPods {
    fn pods_on_node(&self, _node_name: &str) -> Vec<Pod> {
        Vec::new()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    info!("starting mcp-controllerd");

    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        Arc::new(NoPods),
        Duration::seconds(args.drain_timeout_seconds),
        Duration::seconds(args.eviction_grace_seconds),
    ));

    let mut events = store.watch();
    let event_dispatcher = dispatcher.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => event_dispatcher.handle_store_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "store event subscriber lagged, resyncing on next pass");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        signal_cancel.cancel();
    });

    dispatcher.run(cancel).await;
    info!("mcp-controllerd stopped");
    Ok(())
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("mcp_controllerd=debug,mcp_controller=debug,mcp_rollout=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
