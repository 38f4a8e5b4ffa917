//! dynstuned
//!
//! Debounced schedtune boost daemon. Reads channel names from stdin (one per
//! line, optionally followed by `on`/`off`) and shuts down on EOF.

use anyhow::Context;
use clap::Parser;
use dynstune_policy::{StuneFsBackend, TracingBackend, TuneBackend};
use dynstune_production::{build_engine, run_feed, DaemonConfig};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dynstuned")]
#[command(about = "Debounced schedtune boost daemon")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, in tracing EnvFilter syntax
    #[arg(long, default_value = "info")]
    log_filter: String,

    /// Print the resolved channel configuration and exit
    #[arg(long)]
    dry_run: bool,

    /// Log schedtune changes instead of writing them
    #[arg(long)]
    log_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_thread_names(true)
        .init();

    let config = match &cli.config {
        Some(path) => DaemonConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => DaemonConfig::default(),
    };

    if cli.dry_run {
        let channels = config.channel_configs()?;
        println!("topology: {:?}", config.topology());
        for channel in &channels {
            println!("{:#?}", channel);
        }
        return Ok(());
    }

    let backend: Arc<dyn TuneBackend> = if cli.log_only {
        Arc::new(TracingBackend)
    } else {
        Arc::new(StuneFsBackend::new(
            &config.stune.root,
            config.stune.boost_value,
        ))
    };

    let mut engine = build_engine(&config, backend).context("Failed to start engine")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        log_only = cli.log_only,
        "dynstuned running"
    );

    let summary = run_feed(&engine, io::stdin().lock()).context("Failed to read trigger feed")?;
    engine.shutdown();

    for channel in engine.channels() {
        if let Some(stats) = engine.stats(channel) {
            info!(
                channel = %channel,
                admitted = stats.admitted,
                coalesced = stats.coalesced,
                suppressed = stats.suppressed,
                applies = stats.applies,
                reverts = stats.reverts,
                "Channel statistics"
            );
        }
    }
    info!(ignored = summary.ignored, "dynstuned stopped");

    Ok(())
}
