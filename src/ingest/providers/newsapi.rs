use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::config::settings::NewsSettings;
use crate::ingest::types::{FetchOutcome, FetchQuery, NewsSource, RawArticle};
use crate::metrics::names;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Option<Vec<serde_json::Value>>,
}

/// NewsAPI `/v2/everything` client.
pub struct NewsApiSource {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        endpoint: String,
        api_key: String,
        client: reqwest::Client,
    },
}

impl NewsApiSource {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("btc-news-bot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()
            .context("building news http client")?;
        Ok(Self {
            mode: Mode::Http {
                endpoint: endpoint.into(),
                api_key: api_key.into(),
                client,
            },
        })
    }

    pub fn from_settings(cfg: &NewsSettings, api_key: &str) -> Result<Self> {
        Self::new(
            cfg.endpoint.clone(),
            api_key,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    /// Serve a canned response body instead of calling the API.
    pub fn from_fixture_str(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    /// Parse a response body. Articles that are not even JSON objects are
    /// dropped individually; the rest of the batch is kept.
    pub fn parse_body(body: &str) -> Result<Vec<RawArticle>> {
        let env: Envelope = serde_json::from_str(body).context("parsing news api json")?;
        if env.status.as_deref() == Some("error") {
            return Err(anyhow!(
                "news api error {}: {}",
                env.code.unwrap_or_default(),
                env.message.unwrap_or_default()
            ));
        }
        let items = env
            .articles
            .ok_or_else(|| anyhow!("news api response has no `articles` list"))?;

        let mut out = Vec::with_capacity(items.len());
        for (idx, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<RawArticle>(item) {
                Ok(a) => out.push(a),
                Err(e) => {
                    tracing::warn!(index = idx, error = %e, "dropping unreadable article");
                    counter!(names::SKIPPED, "reason" => "unreadable").increment(1);
                }
            }
        }
        Ok(out)
    }

    async fn fetch_body(&self, query: &FetchQuery) -> Result<Vec<RawArticle>> {
        match &self.mode {
            Mode::Fixture(body) => Self::parse_body(body),
            Mode::Http {
                endpoint,
                api_key,
                client,
            } => {
                let page_size = query.page_size.to_string();
                let resp = client
                    .get(endpoint)
                    .header("X-Api-Key", api_key)
                    .query(&[
                        ("q", query.query.as_str()),
                        ("sortBy", query.sort.as_param()),
                        ("language", query.language.as_str()),
                        ("pageSize", page_size.as_str()),
                    ])
                    .send()
                    .await
                    .context("news api request")?;

                let status = resp.status();
                let body = resp.text().await.context("news api body")?;
                if !status.is_success() {
                    // The error envelope carries a readable message; prefer it.
                    return match Self::parse_body(&body) {
                        Err(e) => Err(e.context(format!("news api http {status}"))),
                        Ok(_) => Err(anyhow!("news api http {status}")),
                    };
                }
                Self::parse_body(&body)
            }
        }
    }
}

#[async_trait]
impl NewsSource for NewsApiSource {
    async fn fetch_candidates(&self, query: &FetchQuery) -> FetchOutcome {
        let t0 = std::time::Instant::now();
        let res = self.fetch_body(query).await;
        histogram!(names::FETCH_MS).record(t0.elapsed().as_secs_f64() * 1_000.0);

        match res {
            Ok(mut items) => {
                items.truncate(query.page_size);
                tracing::debug!(provider = self.name(), count = items.len(), "fetched candidates");
                FetchOutcome::Fetched(items)
            }
            Err(e) => {
                tracing::warn!(error = ?e, provider = self.name(), "news fetch failed");
                counter!(names::FETCH_ERRORS).increment(1);
                FetchOutcome::Degraded {
                    reason: format!("{e:#}"),
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}
