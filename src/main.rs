use std::sync::Arc;

use tracing::{error, info};

use nuntia::feed::start_feed_updater;
use nuntia::{Config, Database, FeedFetcher, FeedSyncer, FeedUpdater};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    let mut config_path = DEFAULT_CONFIG_PATH.to_string();
    let mut once = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--once" => once = true,
            path => config_path = path.to_string(),
        }
    }

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = nuntia::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        nuntia::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("Nuntia - RSS feed ingestion");
    info!("Database: {}", config.database.path);

    let db = match Database::open(&config.database.path, config.database.max_connections).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let fetcher = match FeedFetcher::new(&config.fetch) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create feed fetcher: {}", e);
            std::process::exit(1);
        }
    };
    let syncer = Arc::new(FeedSyncer::new(db.clone(), fetcher, config.sync.clone()));

    if once {
        let updater = FeedUpdater::new(syncer, config.sync.interval_secs);
        if let Err(e) = updater.run_once().await {
            error!("Feed refresh failed: {}", e);
            db.close().await;
            std::process::exit(1);
        }
        db.close().await;
        return;
    }

    let handle = start_feed_updater(syncer, config.sync.interval_secs);
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    handle.abort();
    db.close().await;
}
