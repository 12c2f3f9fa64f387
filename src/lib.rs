// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod bot;
pub mod config;
pub mod fingerprint;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod translate;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router as router;
pub use crate::fingerprint::{fingerprint, Fingerprint};
pub use crate::notify::{ChatTransport, Destination};
pub use crate::pipeline::{Pipeline, PipelineCfg, RunMode, RunOutcome, RunReport};
pub use crate::scheduler::{Activation, Scheduler};
pub use crate::store::{DedupStore, DeliveredRecord, SqliteDedupStore, StoreError};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG`, defaulting to `btc_news_bot=info,warn`.
/// `LOG_FORMAT=json` switches to JSON lines. Safe to call when a subscriber is
/// already installed (e.g. by the deployment runtime); the call is then a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("btc_news_bot=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
