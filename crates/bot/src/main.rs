use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use tracing_subscriber::EnvFilter;

use marquee_common::config::AppConfig;
use marquee_common::db;

use marquee_clients::catalog::{CatalogClient, ContentSource};
use marquee_clients::overseerr::OverseerrClient;

use marquee_engine::announcer::{AnnounceSettings, Announcer};
use marquee_engine::correlator::MessageCorrelator;
use marquee_engine::ledger::NotificationLedger;
use marquee_engine::messenger::Messenger;
use marquee_engine::orchestrator::RequestOrchestrator;
use marquee_engine::reactions::ReactionHandler;

use marquee_bot::telegram::TelegramBot;
use marquee_bot::updates::UpdateDispatcher;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "marquee=info".into()),
        )
        .init();

    tracing::info!("Marquee starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to the ledger database
    let pool = db::create_pool(&config.database_url).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // getUpdates long polls override this per request
    let http = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .build()?;

    let source: Arc<dyn ContentSource> = Arc::new(CatalogClient::new(
        http.clone(),
        config.source_base_url.clone(),
    ));
    let requests = Arc::new(OverseerrClient::new(
        http.clone(),
        config.overseerr_url.clone(),
        config.overseerr_api_key.clone(),
    ));
    let bot = Arc::new(TelegramBot::new(
        http,
        config.telegram_bot_token.clone(),
        config.telegram_chat_id,
        config.request_emoji.clone(),
    ));

    // The content source is a hard dependency; fail fast if it is down.
    source
        .fetch_filtered(&config.source_filter, 1)
        .await
        .context("content source unreachable at startup")?;
    tracing::info!(base_url = %config.source_base_url, "Content source reachable");

    let ledger = NotificationLedger::new(pool.clone());
    let tracked = ledger.tracked_messages().await?;
    tracing::info!(
        tracked_messages = tracked.len(),
        "Ledger loaded; reactions on earlier announcements resolve through it"
    );

    let correlator = Arc::new(MessageCorrelator::new(ledger.clone()));
    let messenger: Arc<dyn Messenger> = bot.clone();

    let announcer = Announcer::new(
        source,
        messenger.clone(),
        ledger.clone(),
        correlator.clone(),
        AnnounceSettings {
            filter: config.source_filter.clone(),
            pages: config.source_pages,
            send_delay: Duration::from_millis(config.send_delay_ms),
        },
    );

    let orchestrator = RequestOrchestrator::new(requests, messenger);
    let reactions = ReactionHandler::new(correlator, orchestrator, config.request_emoji.clone());
    let dispatcher = UpdateDispatcher::new(bot, reactions, ledger);

    // First tick fires immediately, so a fresh deploy announces right away.
    let fetch_interval = Duration::from_secs(config.fetch_interval_hours * 3600);
    let scheduler = async {
        let mut ticker = tokio::time::interval(fetch_interval);
        loop {
            ticker.tick().await;
            match announcer.send_new_releases().await {
                Ok(count) => {
                    tracing::info!(announced = count, "Announcement cycle finished");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Announcement cycle failed");
                }
            }
        }
    };

    tracing::info!(
        fetch_interval_hours = config.fetch_interval_hours,
        "Scheduler and update dispatcher running"
    );

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        _ = scheduler => {}
        result = dispatcher.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Update dispatcher exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    pool.close().await;
    tracing::info!("Marquee stopped.");
    Ok(())
}
