// tests/common/mod.rs
// Shared mocks for pipeline/scheduler integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use btc_news_bot::ingest::types::{FetchOutcome, FetchQuery, NewsSource, RawArticle, RawSource};
use btc_news_bot::notify::{ChatTransport, Destination};
use btc_news_bot::translate::{LangPair, Translation, Translator};
use btc_news_bot::{DedupStore, Pipeline, PipelineCfg, SqliteDedupStore};

pub fn raw(title: &str, url: &str, ts: &str) -> RawArticle {
    RawArticle {
        title: Some(title.to_string()),
        url: Some(url.to_string()),
        source: Some(RawSource {
            name: Some("CoinDesk".to_string()),
        }),
        published_at: Some(ts.to_string()),
    }
}

pub fn three_articles() -> Vec<RawArticle> {
    vec![
        raw("Bitcoin breaks $100k", "https://news.test/1", "2025-03-14T09:30:00Z"),
        raw("ETF inflows hit record", "https://news.test/2", "2025-03-14T09:00:00Z"),
        raw("Miners sell reserves", "https://news.test/3", "2025-03-14T08:45:00Z"),
    ]
}

/// Serves queued outcomes; when the queue runs dry the last one repeats.
pub struct MockSource {
    queue: Mutex<VecDeque<FetchOutcome>>,
    last: Mutex<FetchOutcome>,
    pub calls: AtomicUsize,
    pub page_sizes: Mutex<Vec<usize>>,
}

impl MockSource {
    pub fn fixed(items: Vec<RawArticle>) -> Self {
        Self::sequence(vec![FetchOutcome::Fetched(items)])
    }

    pub fn sequence(outcomes: Vec<FetchOutcome>) -> Self {
        let last = outcomes
            .last()
            .cloned()
            .unwrap_or(FetchOutcome::Fetched(Vec::new()));
        Self {
            queue: Mutex::new(outcomes.into()),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
            page_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsSource for MockSource {
    async fn fetch_candidates(&self, query: &FetchQuery) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.page_sizes.lock().unwrap().push(query.page_size);
        let next = self.queue.lock().unwrap().pop_front();
        let out = match next {
            Some(o) => o,
            None => self.last.lock().unwrap().clone(),
        };
        match out {
            FetchOutcome::Fetched(mut v) => {
                v.truncate(query.page_size);
                FetchOutcome::Fetched(v)
            }
            degraded => degraded,
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Prefixes the target language, or fails every call.
pub struct MockTranslator {
    pub fail: bool,
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, pair: &LangPair) -> Translation {
        if self.fail {
            return Translation::Degraded {
                original: text.to_string(),
                reason: "forced failure".to_string(),
            };
        }
        Translation::Translated(format!("[{}] {}", pair.target, text))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Records every message; fails those containing `fail_on`.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(Destination, String)>>,
    pub fail_on: Option<String>,
    pub delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<(Destination, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.sent().iter().filter(|(_, t)| t.contains(needle)).count()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn deliver(&self, dest: Destination, text: &str) -> Result<()> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if let Some(needle) = &self.fail_on {
            if text.contains(needle.as_str()) {
                return Err(anyhow!("chat not reachable"));
            }
        }
        self.sent.lock().unwrap().push((dest, text.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub struct Harness {
    pub source: Arc<MockSource>,
    pub transport: Arc<RecordingTransport>,
    pub store: Arc<SqliteDedupStore>,
    pub pipeline: Arc<Pipeline>,
}

pub async fn harness(source: MockSource, translator: MockTranslator, transport: RecordingTransport) -> Harness {
    let source = Arc::new(source);
    let transport = Arc::new(transport);
    let store = Arc::new(SqliteDedupStore::open_in_memory().await.expect("in-memory store"));
    let pipeline = Arc::new(Pipeline::new(
        source.clone(),
        Arc::new(translator),
        transport.clone(),
        store.clone(),
        PipelineCfg::default(),
    ));
    Harness {
        source,
        transport,
        store,
        pipeline,
    }
}

pub async fn record_count(store: &SqliteDedupStore) -> u64 {
    store.count().await.expect("count")
}

/// Purely in-process store; keeps paused-clock tests free of blocking I/O.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<std::collections::HashMap<btc_news_bot::Fingerprint, btc_news_bot::DeliveredRecord>>,
}

#[async_trait]
impl DedupStore for MemoryStore {
    async fn exists(&self, fp: &btc_news_bot::Fingerprint) -> btc_news_bot::store::StoreResult<bool> {
        Ok(self.records.lock().unwrap().contains_key(fp))
    }

    async fn record(&self, rec: &btc_news_bot::DeliveredRecord) -> btc_news_bot::store::StoreResult<()> {
        let mut map = self.records.lock().unwrap();
        if map.contains_key(&rec.fingerprint) {
            return Err(btc_news_bot::StoreError::DuplicateKey(rec.fingerprint.clone()));
        }
        map.insert(rec.fingerprint.clone(), rec.clone());
        Ok(())
    }

    async fn get(
        &self,
        fp: &btc_news_bot::Fingerprint,
    ) -> btc_news_bot::store::StoreResult<Option<btc_news_bot::DeliveredRecord>> {
        Ok(self.records.lock().unwrap().get(fp).cloned())
    }

    async fn count(&self) -> btc_news_bot::store::StoreResult<u64> {
        Ok(self.records.lock().unwrap().len() as u64)
    }
}

pub fn memory_pipeline(
    source: Arc<dyn NewsSource>,
    transport: Arc<RecordingTransport>,
    store: Arc<MemoryStore>,
) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(
        source,
        Arc::new(MockTranslator { fail: false }),
        transport,
        store,
        PipelineCfg::default(),
    ))
}
