//! Sigflow Daemon - dataflow node host.
//!
//! Loads a node graph, reads input events as JSON lines on stdin, delivers
//! scheduler ticks, and emits output events as JSON lines on stdout.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sigflowd::config::GraphConfig;
use sigflowd::runtime::Runtime;

#[derive(Debug, Parser)]
#[command(name = "sigflowd", version, about = "Dataflow node host daemon")]
struct Args {
    /// Path to the TOML graph file.
    #[arg(long)]
    config: PathBuf,

    /// Log filter, e.g. `info` or `sigflow_common=debug`.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .with_writer(std::io::stderr)
        .init();

    info!("sigflowd v{} starting", env!("CARGO_PKG_VERSION"));

    let config = GraphConfig::load(&args.config)?;
    info!(
        nodes = config.nodes.len(),
        wires = config.wires.len(),
        "graph loaded"
    );

    let runtime = Runtime::build(config)?;
    info!("sigflowd ready");

    runtime.run().await?;

    info!("shutting down gracefully");
    Ok(())
}
