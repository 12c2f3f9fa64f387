//! pipeline.rs: one run of fetch → identify → filter → translate → deliver → record.
//!
//! A run never fails as a whole: fetch problems end it early, per-candidate
//! problems skip that candidate, and the outcome is reported as data in
//! [`RunReport`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use metrics::counter;

use crate::config::settings::{NewsSettings, Settings};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::ingest::types::{Article, FetchOutcome, NewsSource, RawArticle, SkipReason};
use crate::metrics::{ensure_metrics_described, names};
use crate::notify::{format, ChatTransport, Destination};
use crate::store::{DedupStore, DeliveredRecord, StoreError};
use crate::translate::{LangPair, Translator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Timer-triggered; silent on no-op and on failure.
    Scheduled,
    /// Explicit `/latest` request; smaller window, always answers.
    OnDemand,
}

impl RunMode {
    pub fn label(&self) -> &'static str {
        match self {
            RunMode::Scheduled => "scheduled",
            RunMode::OnDemand => "on_demand",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineCfg {
    pub news: NewsSettings,
    pub lang_pair: LangPair,
}

impl PipelineCfg {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            news: s.news.clone(),
            lang_pair: s.translate.lang_pair(),
        }
    }

    fn page_size(&self, mode: RunMode) -> usize {
        match mode {
            RunMode::Scheduled => self.news.page_size,
            RunMode::OnDemand => self.news.on_demand_window,
        }
    }
}

impl Default for PipelineCfg {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Classification of one fetched item against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    New { article: Article, fingerprint: Fingerprint },
    Seen(Fingerprint),
    Skipped { index: usize, reason: SkipReason },
}

/// What happened to one new candidate in the delivery phase.
#[derive(Debug, Clone, PartialEq)]
enum ItemOutcome {
    Delivered,
    /// Delivered, but another run recorded the same fingerprint first.
    DeliveredRaced,
    /// Delivered, but the record could not be written.
    DeliveredUnrecorded(String),
    /// Another run in this process is delivering it right now.
    Claimed,
    /// Recorded by someone else between classification and delivery.
    AlreadyRecorded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    FetchFailed(String),
    NothingFetched,
    NothingNew,
    Delivered(usize),
    /// There were new items but none could be delivered.
    DeliveryFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub dest: Destination,
    pub mode: RunMode,
    pub fetched: usize,
    pub skipped: usize,
    pub seen: usize,
    pub delivered: usize,
    pub raced: usize,
    pub failed: usize,
    pub unrecorded: usize,
    pub translate_fallbacks: usize,
    pub outcome: RunOutcome,
}

impl RunReport {
    fn new(dest: Destination, mode: RunMode) -> Self {
        Self {
            dest,
            mode,
            fetched: 0,
            skipped: 0,
            seen: 0,
            delivered: 0,
            raced: 0,
            failed: 0,
            unrecorded: 0,
            translate_fallbacks: 0,
            outcome: RunOutcome::NothingFetched,
        }
    }

    /// Human-readable answer for an on-demand request.
    pub fn reply_text(&self) -> String {
        match &self.outcome {
            RunOutcome::FetchFailed(_) | RunOutcome::DeliveryFailed => format::FETCH_ERROR.to_string(),
            RunOutcome::NothingFetched => format::NO_NEWS_FOUND.to_string(),
            RunOutcome::NothingNew => format::NOTHING_NEW.to_string(),
            RunOutcome::Delivered(n) => format::sent_summary(*n),
        }
    }
}

/// Removes the fingerprint from the in-flight set when dropped.
struct Claim<'a> {
    set: &'a Mutex<HashSet<Fingerprint>>,
    fp: Fingerprint,
}

impl<'a> Claim<'a> {
    fn acquire(set: &'a Mutex<HashSet<Fingerprint>>, fp: &Fingerprint) -> Option<Self> {
        let mut guard = set.lock().unwrap_or_else(|p| p.into_inner());
        if !guard.insert(fp.clone()) {
            return None;
        }
        Some(Self {
            set,
            fp: fp.clone(),
        })
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut guard = self.set.lock().unwrap_or_else(|p| p.into_inner());
        guard.remove(&self.fp);
    }
}

pub struct Pipeline {
    source: Arc<dyn NewsSource>,
    translator: Arc<dyn Translator>,
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn DedupStore>,
    cfg: PipelineCfg,
    in_flight: Mutex<HashSet<Fingerprint>>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn NewsSource>,
        translator: Arc<dyn Translator>,
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn DedupStore>,
        cfg: PipelineCfg,
    ) -> Self {
        ensure_metrics_described();
        Self {
            source,
            translator,
            transport,
            store,
            cfg,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn DedupStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    /// Run the on-demand flow and return the reply for the requester.
    pub async fn on_demand(&self, dest: Destination) -> String {
        self.run(dest, RunMode::OnDemand).await.reply_text()
    }

    pub async fn run(&self, dest: Destination, mode: RunMode) -> RunReport {
        counter!(names::RUNS, "mode" => mode.label()).increment(1);
        let mut report = RunReport::new(dest, mode);

        // 1) Fetch
        let query = self.cfg.news.query(self.cfg.page_size(mode));
        let raw = match self.source.fetch_candidates(&query).await {
            FetchOutcome::Fetched(v) => v,
            FetchOutcome::Degraded { reason } => {
                tracing::warn!(dest = %dest, mode = mode.label(), %reason, "run ended: fetch failed");
                report.outcome = RunOutcome::FetchFailed(reason);
                return report;
            }
        };
        if raw.is_empty() {
            tracing::info!(dest = %dest, mode = mode.label(), "no articles fetched");
            report.outcome = RunOutcome::NothingFetched;
            return report;
        }
        report.fetched = raw.len();

        // 2) Identify & filter
        let mut fresh = Vec::new();
        for c in self.classify(raw).await {
            match c {
                Candidate::New {
                    article,
                    fingerprint,
                } => fresh.push((article, fingerprint)),
                Candidate::Seen(_) => report.seen += 1,
                Candidate::Skipped { index, reason } => {
                    tracing::warn!(dest = %dest, index, reason = %reason, "skipping candidate");
                    counter!(names::SKIPPED, "reason" => reason.label()).increment(1);
                    report.skipped += 1;
                }
            }
        }
        if fresh.is_empty() {
            tracing::info!(
                dest = %dest,
                mode = mode.label(),
                fetched = report.fetched,
                seen = report.seen,
                skipped = report.skipped,
                "nothing new"
            );
            report.outcome = RunOutcome::NothingNew;
            return report;
        }

        // 3) + 4) Deliver then record, in fetch order
        for (article, fp) in fresh.iter() {
            match self.deliver_one(dest, mode, article, fp, &mut report).await {
                ItemOutcome::Delivered => report.delivered += 1,
                ItemOutcome::DeliveredRaced => {
                    report.delivered += 1;
                    report.raced += 1;
                }
                ItemOutcome::DeliveredUnrecorded(e) => {
                    tracing::error!(dest = %dest, fp = fp.short(), error = %e, "delivered but not recorded");
                    report.delivered += 1;
                    report.unrecorded += 1;
                }
                ItemOutcome::Claimed | ItemOutcome::AlreadyRecorded => report.seen += 1,
                ItemOutcome::Failed(e) => {
                    tracing::warn!(dest = %dest, fp = fp.short(), error = %e, "candidate not delivered");
                    report.failed += 1;
                }
            }
        }

        report.outcome = if report.delivered > 0 {
            RunOutcome::Delivered(report.delivered)
        } else if report.failed > 0 {
            RunOutcome::DeliveryFailed
        } else {
            RunOutcome::NothingNew
        };

        tracing::info!(
            dest = %dest,
            mode = mode.label(),
            fetched = report.fetched,
            seen = report.seen,
            skipped = report.skipped,
            delivered = report.delivered,
            failed = report.failed,
            raced = report.raced,
            "run finished"
        );
        report
    }

    /// Parse, fingerprint and look up every fetched item, keeping fetch order.
    pub async fn classify(&self, raw: Vec<RawArticle>) -> Vec<Candidate> {
        let mut out = Vec::with_capacity(raw.len());
        let mut in_batch: HashSet<Fingerprint> = HashSet::new();

        for (index, item) in raw.into_iter().enumerate() {
            let article = match item.parse() {
                Ok(a) => a,
                Err(reason) => {
                    out.push(Candidate::Skipped { index, reason });
                    continue;
                }
            };
            let fp = fingerprint(&article.title, &article.url);

            if !in_batch.insert(fp.clone()) {
                out.push(Candidate::Seen(fp));
                continue;
            }

            match self.store.exists(&fp).await {
                Ok(true) => out.push(Candidate::Seen(fp)),
                Ok(false) => out.push(Candidate::New {
                    article,
                    fingerprint: fp,
                }),
                Err(e) => out.push(Candidate::Skipped {
                    index,
                    reason: SkipReason::StoreUnavailable(e.to_string()),
                }),
            }
        }
        out
    }

    async fn deliver_one(
        &self,
        dest: Destination,
        mode: RunMode,
        article: &Article,
        fp: &Fingerprint,
        report: &mut RunReport,
    ) -> ItemOutcome {
        let Some(_claim) = Claim::acquire(&self.in_flight, fp) else {
            tracing::debug!(dest = %dest, fp = fp.short(), "claimed by a concurrent run");
            return ItemOutcome::Claimed;
        };

        // Narrow the check-then-insert window: earlier items in this batch took time.
        match self.store.exists(fp).await {
            Ok(true) => return ItemOutcome::AlreadyRecorded,
            Ok(false) => {}
            Err(e) => return ItemOutcome::Failed(format!("store lookup: {e}")),
        }

        let translation = self
            .translator
            .translate(&article.title, &self.cfg.lang_pair)
            .await;
        if translation.is_degraded() {
            report.translate_fallbacks += 1;
        }

        let text = match mode {
            RunMode::Scheduled => format::scheduled_message(article, translation.text()),
            RunMode::OnDemand => format::on_demand_message(article, translation.text()),
        };

        if let Err(e) = self.transport.deliver(dest, &text).await {
            counter!(names::DELIVERY_ERRORS).increment(1);
            return ItemOutcome::Failed(format!("{e:#}"));
        }
        counter!(names::DELIVERED, "mode" => mode.label()).increment(1);

        let rec = DeliveredRecord {
            fingerprint: fp.clone(),
            original_title: article.title.clone(),
            translated_title: translation.into_text(),
            url: article.url.clone(),
            source_name: article.source_name.clone(),
            published_at: article.published_at,
        };
        match self.store.record(&rec).await {
            Ok(()) => ItemOutcome::Delivered,
            Err(StoreError::DuplicateKey(_)) => {
                tracing::warn!(dest = %dest, fp = fp.short(), "fingerprint recorded by another run");
                counter!(names::DUPLICATE_RECORDS).increment(1);
                ItemOutcome::DeliveredRaced
            }
            Err(e) => ItemOutcome::DeliveredUnrecorded(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive_and_released_on_drop() {
        let set = Mutex::new(HashSet::new());
        let fp = fingerprint("a", "b");
        {
            let first = Claim::acquire(&set, &fp);
            assert!(first.is_some());
            assert!(Claim::acquire(&set, &fp).is_none());
        }
        assert!(Claim::acquire(&set, &fp).is_some());
    }

    #[test]
    fn reply_text_per_outcome() {
        let mut r = RunReport::new(Destination(1), RunMode::OnDemand);
        r.outcome = RunOutcome::NothingNew;
        assert_eq!(r.reply_text(), format::NOTHING_NEW);
        r.outcome = RunOutcome::NothingFetched;
        assert_eq!(r.reply_text(), format::NO_NEWS_FOUND);
        r.outcome = RunOutcome::FetchFailed("timeout".into());
        assert_eq!(r.reply_text(), format::FETCH_ERROR);
        r.outcome = RunOutcome::Delivered(2);
        assert_eq!(r.reply_text(), format::sent_summary(2));
    }

    #[test]
    fn page_size_depends_on_mode() {
        let cfg = PipelineCfg::default();
        assert_eq!(cfg.page_size(RunMode::Scheduled), 20);
        assert_eq!(cfg.page_size(RunMode::OnDemand), 5);
    }
}
