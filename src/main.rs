//! Strata Runtime worker entry point.
//!
//! Runs a single-process worker: an in-memory queue and backing store wired
//! to the dispatch loop, emulating the distributed deployment on one
//! machine.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strata_abi::FunctionMemory;
use strata_common::ConfigFile;
use strata_state::{BackingStore, MemoryStore, StateCache};
use strata_worker::{
    CallUnit, ChainSet, GuestFunction, HostContext, Invoker, LocalEngine, MemoryQueue, Worker,
};

/// Host-side runtime for sandboxed functions with shared synchronized state.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "STRATA_CONFIG")]
    config: Option<String>,

    /// Override the dispatch loop iteration bound.
    #[arg(long)]
    iterations: Option<usize>,
}

/// Built-in demo function: copies its input to its output.
struct Echo;

#[async_trait]
impl GuestFunction for Echo {
    async fn exec(&self, memory: &mut FunctionMemory, _host: &HostContext) -> bool {
        let input = memory.input().to_vec();
        memory.set_output(&input).is_ok()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strata=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Strata Runtime worker");

    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => {
            ConfigFile::from_file(path).with_context(|| format!("Failed to load config: {path}"))?
        }
        None => ConfigFile::default(),
    };
    if cli.iterations.is_some() {
        config.runtime.worker.max_iterations = cli.iterations;
    }

    info!(
        default_scope = %config.runtime.state.default_scope,
        queue_capacity = config.queue.capacity,
        "Configuration loaded"
    );

    // Wire the single-process runtime: in-memory store and queue
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(StateCache::new(
        Arc::clone(&store) as Arc<dyn BackingStore>,
        &config.runtime.state,
    ));

    let engine = Arc::new(LocalEngine::new());
    engine.register(1, "echo", Arc::new(Echo));

    let invoker = Invoker::new(
        engine,
        Arc::new(ChainSet::new()),
        Arc::clone(&state),
        config.runtime.worker.clone(),
    );

    let (queue, producer) = MemoryQueue::new(config.queue.capacity);
    let queue = Arc::new(queue);

    // Demo workload for the emulated deployment
    let scope = config.runtime.state.default_scope.clone();
    for i in 0..3u8 {
        producer
            .submit(CallUnit::new(scope.clone(), 1, vec![i]))
            .await?;
    }
    drop(producer);

    let worker = Worker::new(Arc::clone(&queue) as _, invoker);
    let processed = worker.run().await?;

    info!(
        processed,
        reported = queue.reported(),
        "Worker finished"
    );

    // Teardown point for the process-scoped cache
    state.clear();

    Ok(())
}
