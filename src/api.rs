use std::sync::Arc;

use shuttle_axum::axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::scheduler::Scheduler;
use crate::store::DedupStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DedupStore>,
    pub scheduler: Arc<Scheduler>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct StatusOut {
    pub subscriptions: usize,
    pub delivered_records: u64,
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusOut>, (StatusCode, String)> {
    let delivered_records = state.store.count().await.map_err(|e| {
        tracing::warn!(error = %e, "status: store count failed");
        (StatusCode::SERVICE_UNAVAILABLE, "store unavailable".to_string())
    })?;
    Ok(Json(StatusOut {
        subscriptions: state.scheduler.len(),
        delivered_records,
    }))
}
