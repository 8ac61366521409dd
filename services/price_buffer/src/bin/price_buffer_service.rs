//! Price buffer service entry point
//!
//! Reads newline-delimited batch envelopes from stdin (or a file), buffers them,
//! and flushes into an in-memory store on a fixed interval. Ctrl-C or end of
//! input triggers a final flush before exit.

use anyhow::Context;
use clap::Parser;
use price_buffer::logging::init_logging;
use price_buffer::{
    ingest_stream, FlushCoordinator, FlushScheduler, MemoryStore, Partition, PriceBuffer,
    PriceStore,
};
use service_config::load_config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment overlay to apply (config/environments/<name>.toml)
    #[arg(short, long)]
    environment: Option<String>,

    /// Seconds between flushes, overrides the config file
    #[arg(long)]
    flush_interval: Option<u64>,

    /// Input file with one batch per line; `-` reads stdin
    #[arg(short, long)]
    input: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref(), args.environment.as_deref())?;
    if let Some(secs) = args.flush_interval {
        config.flush_interval_secs = secs;
        config.validate()?;
    }
    if args.input.is_some() {
        config.input = args.input;
    }

    init_logging(&config.log_level, config.log_format)?;

    info!("Starting price buffer service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        flush_interval_secs = config.flush_interval_secs,
        input = config.input.as_deref().unwrap_or("-"),
        "Configuration loaded"
    );

    let buffer = Arc::new(PriceBuffer::new());
    let coordinator = Arc::new(FlushCoordinator::new(buffer.clone()));
    let store = MemoryStore::new();
    let scheduler = FlushScheduler::spawn(
        coordinator.clone(),
        Arc::new(store.clone()) as Arc<dyn PriceStore>,
        config.flush_interval(),
    );

    let reader = open_input(config.input.as_deref()).await?;

    tokio::select! {
        result = ingest_stream(&buffer, reader) => match result {
            Ok(summary) => info!(
                batches = summary.batches,
                merged = summary.merged,
                rejected = summary.rejected_lines,
                unknown_partitions = summary.unknown_partitions,
                "Input exhausted"
            ),
            Err(e) => error!(error = %e, "Input stream failed"),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    if let Some(report) = scheduler.shutdown().await {
        info!(rows = report.rows_touched, "Final flush: {:?}", report.outcome);
    }

    let stats = coordinator.stats();
    info!(
        flushes = stats.flushes,
        commits = stats.commits,
        failures = stats.failures,
        rows = stats.rows_touched,
        "Flush totals"
    );
    for partition in Partition::ALL {
        info!(
            %partition,
            rows = store.row_count(partition.table()),
            "Persisted rows"
        );
    }

    info!("Price buffer service stopped");
    Ok(())
}

async fn open_input(input: Option<&str>) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match input {
        None | Some("-") => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input file {}", path))?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}
