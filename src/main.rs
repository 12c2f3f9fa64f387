//! btc-news-bot: binary entrypoint.
//! Opens the dedup store, wires the pipeline, starts Telegram polling and
//! serves the status/metrics router.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use btc_news_bot::api::{self, AppState};
use btc_news_bot::bot::{self, Bot};
use btc_news_bot::config::{load_settings_default, Secrets};
use btc_news_bot::ingest::providers::newsapi::NewsApiSource;
use btc_news_bot::metrics::Metrics;
use btc_news_bot::notify::TelegramClient;
use btc_news_bot::{translate, Pipeline, PipelineCfg, Scheduler, SqliteDedupStore};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    btc_news_bot::init_tracing();
    // Recorder first, so counters registered below are captured.
    let metrics = Metrics::init()?;

    // Fatal startup checks: nothing runs until these pass.
    let secrets = Secrets::from_env().map_err(|e| {
        tracing::error!(error = %e, "startup aborted");
        anyhow::anyhow!(e)
    })?;
    let settings = load_settings_default().context("loading settings")?;
    tracing::info!(
        query = %settings.news.query,
        interval_secs = settings.schedule.interval_secs,
        translate = settings.translate.enabled,
        "settings loaded"
    );

    let store = Arc::new(
        SqliteDedupStore::open(&settings.store.database_url)
            .await
            .context("opening dedup store")?,
    );

    let source = Arc::new(NewsApiSource::from_settings(&settings.news, &secrets.news_api_key)?);
    let translator = translate::from_settings(&settings.translate)?;
    let telegram = TelegramClient::from_settings(&settings.telegram, &secrets.telegram_token);

    let pipeline = Arc::new(Pipeline::new(
        source,
        translator,
        Arc::new(telegram.clone()),
        store.clone(),
        PipelineCfg::from_settings(&settings),
    ));
    let scheduler = Arc::new(Scheduler::new(pipeline.clone()));
    let bot = Arc::new(Bot::new(pipeline, scheduler.clone(), settings.schedule.clone()));

    bot::spawn_polling(bot, telegram);

    // Close the store and stop triggers on Ctrl-C / SIGTERM.
    {
        let store = store.clone();
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                scheduler.shutdown();
                store.close().await;
                tracing::info!("dedup store closed");
            }
        });
    }

    let router = api::create_router(AppState { store, scheduler }).merge(metrics.router());

    Ok(router.into())
}
