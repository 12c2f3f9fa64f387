//! Dry run: fetch, translate and print one batch to the log without Telegram
//! or touching the real dedup store.

use std::sync::Arc;

use anyhow::Context;
use btc_news_bot::config::{load_settings_default, ENV_NEWS_API_KEY};
use btc_news_bot::ingest::providers::newsapi::NewsApiSource;
use btc_news_bot::notify::LogTransport;
use btc_news_bot::{translate, Destination, Pipeline, PipelineCfg, RunMode, SqliteDedupStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    btc_news_bot::init_tracing();

    let api_key = std::env::var(ENV_NEWS_API_KEY).with_context(|| format!("{ENV_NEWS_API_KEY} missing"))?;
    let settings = load_settings_default().context("loading settings")?;

    let pipeline = Pipeline::new(
        Arc::new(NewsApiSource::from_settings(&settings.news, &api_key)?),
        translate::from_settings(&settings.translate)?,
        Arc::new(LogTransport),
        Arc::new(SqliteDedupStore::open_in_memory().await?),
        PipelineCfg::from_settings(&settings),
    );

    let report = pipeline.run(Destination(0), RunMode::Scheduled).await;
    println!(
        "preview done: fetched={} delivered={} skipped={} translate_fallbacks={} outcome={:?}",
        report.fetched, report.delivered, report.skipped, report.translate_fallbacks, report.outcome
    );
    Ok(())
}
