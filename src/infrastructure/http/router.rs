use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::infrastructure::http::controllers::{breakers, dlq, jobs};
use crate::infrastructure::http::middleware::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/jobs", post(jobs::enqueue_job).get(jobs::list_jobs))
        .route("/api/jobs/due", get(jobs::due_jobs))
        .route("/api/jobs/running-channels", get(jobs::running_channels))
        .route("/api/jobs/:id", get(jobs::get_job))
        .route("/api/jobs/:id/replay", post(jobs::replay_job))
        .route("/api/dlq", get(dlq::list_entries))
        .route("/api/dlq/stats", get(dlq::get_stats))
        .route("/api/dlq/:id/retry", post(dlq::retry_entry))
        .route("/api/dlq/cleanup", post(dlq::cleanup))
        .route("/api/breakers", get(breakers::list_breakers))
        .route("/api/breakers/:service/reset", post(breakers::reset_breaker))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
