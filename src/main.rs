use anyhow::Context;
use background_service::{NotifierSet, ScheduleSettings, Scheduler, ScrapeCycle, SystemClock};
use dealwatch_core::{AppConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use reddit_client::RedditClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "dealwatch=info,background_service=info,reddit_client=info,deal_store=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Starting Dealwatch - PC hardware deal tracker");

    let config_path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    let source = Arc::new(RedditClient::new(&config.reddit).context("building Reddit client")?);
    let notifier = Arc::new(
        NotifierSet::from_config(&config.notify).context("setting up notification channels")?,
    );

    let cycle = ScrapeCycle::from_config(&config, source, notifier.clone());
    let mut scheduler = Scheduler::new(
        cycle,
        Arc::new(SystemClock),
        notifier,
        ScheduleSettings::from_config(&config),
    );

    tokio::select! {
        _ = scheduler.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("listening for Ctrl-C")?;
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
