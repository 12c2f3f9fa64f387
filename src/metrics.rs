use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub mod names {
    pub const RUNS: &str = "news_runs_total";
    pub const FETCH_ERRORS: &str = "news_fetch_errors_total";
    pub const FETCH_MS: &str = "news_fetch_ms";
    pub const SKIPPED: &str = "news_skipped_total";
    pub const DELIVERED: &str = "news_delivered_total";
    pub const DELIVERY_ERRORS: &str = "news_delivery_errors_total";
    pub const TRANSLATE_FALLBACK: &str = "news_translate_fallback_total";
    pub const DUPLICATE_RECORDS: &str = "news_duplicate_records_total";
    pub const SUBSCRIPTIONS: &str = "news_subscriptions";
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(names::RUNS, "Pipeline runs, labelled by mode.");
        describe_counter!(names::FETCH_ERRORS, "News source fetch failures.");
        describe_histogram!(names::FETCH_MS, "News source fetch time in milliseconds.");
        describe_counter!(names::SKIPPED, "Candidates skipped, labelled by reason.");
        describe_counter!(names::DELIVERED, "Notifications delivered.");
        describe_counter!(names::DELIVERY_ERRORS, "Chat transport failures.");
        describe_counter!(
            names::TRANSLATE_FALLBACK,
            "Titles delivered untranslated because translation failed."
        );
        describe_counter!(
            names::DUPLICATE_RECORDS,
            "Record attempts that hit an existing fingerprint."
        );
        describe_gauge!(names::SUBSCRIPTIONS, "Active scheduled subscriptions.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
