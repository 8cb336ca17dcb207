use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use feedrelay::store::{DedupStore, MemoryStore, SqliteStore};
use feedrelay::summarize::{self, NoopSummarizer, Summarizer};
use feedrelay::{
    start_retention_sweeper, Config, FeedDescriptor, FeedProcessor, FeedUpdater,
    HtmlContentFetcher, HttpFeedSource, MisskeyClient, RetentionSweeper, TokenBucket,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Load configuration; without a file, environment variables are enough to run
    let config = match Config::load_or_default_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    if let Err(e) = feedrelay::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        feedrelay::logging::init_console_only(&config.logging.level);
    }

    info!("feedrelay starting");

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => {
            info!("feedrelay stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> feedrelay::Result<()> {
    let cancel = CancellationToken::new();

    let durable = if config.is_persistent_cache() {
        Some(Arc::new(SqliteStore::open(&config.cache.db_path).await?))
    } else {
        warn!("No cache.db_path configured; delivered entries are forgotten on restart");
        None
    };
    let store: Arc<dyn DedupStore> = match &durable {
        Some(sqlite) => Arc::clone(sqlite) as Arc<dyn DedupStore>,
        None => Arc::new(MemoryStore::new()),
    };

    let summarizer: Arc<dyn Summarizer> = match summarize::from_config(&config.summarizer) {
        Ok(summarizer) => summarizer,
        Err(e) => {
            warn!("Summarizer disabled: {}", e);
            Arc::new(NoopSummarizer)
        }
    };
    info!(
        "Summarizer: {}",
        if summarizer.is_enabled() { config.summarizer.provider.as_str() } else { "disabled" }
    );

    let delivery = MisskeyClient::new(
        &config.delivery.host,
        config.delivery.auth_token.clone(),
        config.delivery.local_only,
        Duration::from_secs(config.delivery.timeout_secs),
    )?;
    info!("Posting to {}", delivery.endpoint());

    let limiter = Arc::new(TokenBucket::new(
        config.delivery.max_permits,
        config.refill_interval(),
    ));

    let mut processor = FeedProcessor::new(
        Arc::new(HttpFeedSource::new()?),
        Arc::new(delivery),
        store,
        limiter,
    )
    .with_summarizer(summarizer)
    .with_visibility(config.visibility()?)
    .with_first_run_latest_only(config.schedule.first_run_latest_only)
    .with_summarize_timeout(Duration::from_secs(config.summarizer.timeout_secs))
    .with_min_content_length(config.summarizer.min_content_length);

    if config.content.enabled {
        let fetcher = HtmlContentFetcher::new(Duration::from_secs(config.content.timeout_secs))?;
        processor = processor.with_content_fetcher(Arc::new(fetcher));
    }

    if processor.latest_only_on_first_run() {
        info!("First run posts only the latest entry of each feed");
    }

    let sweeper = durable.as_ref().map(|sqlite| {
        start_retention_sweeper(
            RetentionSweeper::new(
                sqlite.clone(),
                config.retention_period(),
                config.cleanup_interval(),
            ),
            cancel.clone(),
        )
    });

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            cancel.cancel();
        }
    });

    let feeds: Vec<FeedDescriptor> = config.feeds.iter().map(FeedDescriptor::from).collect();
    FeedUpdater::new(Arc::new(processor), feeds)
        .with_interval(config.fetch_interval())
        .run(cancel.clone())
        .await;

    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            warn!("Cache cleanup task ended abnormally: {}", e);
        }
    }
    if let Some(sqlite) = durable {
        sqlite.close().await;
    }

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
