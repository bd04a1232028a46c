use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::entities::{DlqEntry, DlqStats, Page};
use crate::infrastructure::http::controllers::jobs::JobResponse;
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct DlqListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub channel: Option<String>,
}

pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<DlqListQuery>,
) -> ApiResult<Json<Page<DlqEntry>>> {
    let page = state
        .dlq_service
        .paginate(
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(25),
            query.channel.as_deref(),
        )
        .await?;
    Ok(Json(page))
}

pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<DlqStats>> {
    Ok(Json(state.dlq_service.stats().await?))
}

pub async fn retry_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<JobResponse>)> {
    let job = state
        .dlq_service
        .retry(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("DLQ entry {}", id)))?;
    Ok((
        StatusCode::CREATED,
        Json(JobResponse::from_job(job, &state.display_tz)),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    pub older_than_days: i64,
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn cleanup(
    State(state): State<AppState>,
    Json(request): Json<CleanupRequest>,
) -> ApiResult<Json<Value>> {
    if request.older_than_days < 1 {
        return Err(ApiError::BadRequest(
            "older_than_days must be at least 1".to_string(),
        ));
    }
    let purged = state
        .dlq_service
        .cleanup(request.older_than_days, request.dry_run)
        .await?;
    Ok(Json(json!({
        "purged": purged,
        "dry_run": request.dry_run,
    })))
}
