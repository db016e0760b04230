//! Pool Depth Indexer
//!
//! Follows a block source, keeps running pool depths and checkpoints every
//! block into RocksDB so a restart resumes from the last committed height.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use depth_indexer::core::CheckpointStore;
use depth_indexer::database::RocksDBCheckpointStore;
use depth_indexer::follower::SyntheticBlockSource;
use depth_indexer::{DepthReader, Follower, IndexerConfig, SyncStatus, Timeline, Tracker};

#[derive(Parser)]
#[command(name = "depth-indexer")]
#[command(about = "Pool depth indexer with durable block checkpoints")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "indexer.toml")]
    config: String,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Block interval of the synthetic development chain, in seconds
    #[arg(long, default_value_t = 3)]
    block_interval_secs: i64,

    /// Dry run mode (validate config, run recovery and exit)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_missing = !std::path::Path::new(&cli.config).exists();
    let mut config = if config_missing {
        IndexerConfig::default()
    } else {
        IndexerConfig::from_file(&cli.config)?
    };

    // Override log level if provided
    if let Some(log_level) = cli.log_level {
        config.monitoring.log_level = log_level;
    }

    // Initialize logging
    init_logging(&config)?;

    if config_missing {
        warn!("Config file not found, using defaults: {}", cli.config);
    }

    info!("Starting pool depth indexer");
    info!("RocksDB path: {:?}", config.storage.rocksdb.path);

    config.validate()?;
    config.ensure_directories()?;
    info!("Configuration validated successfully");

    let store: Arc<dyn CheckpointStore> = Arc::new(RocksDBCheckpointStore::open(&config.storage.rocksdb)?);
    let tracker = Arc::new(Tracker::new());
    let mut timeline = Timeline::new(store, Arc::clone(&tracker), config.settlement.policy());

    // Anything but a clean recovery is fatal
    let recovered = timeline.recover()?;
    info!(
        "Resuming at height {} (last committed {})",
        recovered.resume_cursor, recovered.track.height
    );

    if cli.dry_run {
        info!("Dry run mode - recovery succeeded, exiting");
        return Ok(());
    }

    let source = SyntheticBlockSource::new(
        chrono::Utc::now() - chrono::Duration::minutes(10),
        chrono::Duration::seconds(cli.block_interval_secs.max(1)),
    );
    let mut follower = Follower::new(source, timeline, recovered.resume_cursor, &config.follower);
    let liveness = follower.liveness();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut follower_handle = tokio::spawn(async move { follower.run(shutdown_rx).await });

    let status_handle = if config.monitoring.status_interval_secs > 0 {
        let reader = DepthReader::new(Arc::clone(&tracker));
        let interval = Duration::from_secs(config.monitoring.status_interval_secs);
        Some(tokio::spawn(report_status(reader, liveness, interval)))
    } else {
        None
    };

    // Wait for shutdown signal
    info!("Indexer started successfully. Press Ctrl+C to shutdown.");
    let outcome = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
            (&mut follower_handle).await
        }
        result = &mut follower_handle => result,
    };

    if let Some(handle) = status_handle {
        handle.abort();
    }

    match outcome {
        Ok(Ok(())) => info!("Follower finished"),
        Ok(Err(e)) => {
            error!("Follower failed: {}", e);
            return Err(e.into());
        }
        Err(e) => {
            error!("Follower task error: {}", e);
            return Err(e.into());
        }
    }

    info!("Shutting down pool depth indexer");
    Ok(())
}

async fn report_status(reader: DepthReader, liveness: Arc<SyncStatus>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let Some(view) = reader.asset_and_rune_depths() else {
            continue;
        };
        info!(
            "Height {} as of {}: {} pools, in sync: {}",
            view.height(),
            view.as_of(),
            view.snapshot().pools().len(),
            liveness.in_sync()
        );
    }
}

fn init_logging(config: &IndexerConfig) -> Result<()> {
    let log_level = config
        .monitoring
        .log_level
        .parse()
        .unwrap_or(tracing::Level::INFO);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("depth_indexer={}", log_level).into());

    if config.monitoring.structured_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    Ok(())
}
