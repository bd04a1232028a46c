use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::entities::{Job, JobFilter, JobStatus, Page};
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};
use crate::shared::utils::format_local;

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub channel: String,
    pub payload: Value,
    pub run_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub status: JobStatus,
    pub channel: String,
    pub payload: Value,
    pub run_at: String,
    pub run_at_local: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub error: Option<String>,
    pub idempotency_key: String,
    pub remote_id: String,
    pub child_job_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobResponse {
    pub fn from_job(job: Job, tz: &Tz) -> Self {
        Self {
            id: job.id,
            status: job.status,
            channel: job.channel,
            payload: job.payload,
            run_at: job.run_at.to_rfc3339(),
            run_at_local: format_local(job.run_at, tz),
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            error: job.error,
            idempotency_key: job.idempotency_key,
            remote_id: job.remote_id,
            child_job_id: job.child_job_id,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

pub async fn enqueue_job(
    State(state): State<AppState>,
    Json(request): Json<EnqueueRequest>,
) -> ApiResult<(StatusCode, Json<JobResponse>)> {
    if request.channel.is_empty() {
        return Err(ApiError::BadRequest("channel must not be empty".to_string()));
    }

    let job = state
        .queue_service
        .enqueue(
            &request.channel,
            request.payload,
            request.run_at,
            request.idempotency_key,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(JobResponse::from_job(job, &state.display_tz)),
    ))
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub channel: Option<String>,
    pub search: Option<String>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> ApiResult<Json<Page<JobResponse>>> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let filter = JobFilter {
        status,
        channel: query.channel,
        search: query.search,
    };

    let page = state
        .queue_service
        .paginate(query.page.unwrap_or(1), query.per_page.unwrap_or(25), &filter)
        .await?;

    Ok(Json(Page {
        items: page
            .items
            .into_iter()
            .map(|job| JobResponse::from_job(job, &state.display_tz))
            .collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    }))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let job = state
        .queue_service
        .find(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {}", id)))?;
    Ok(Json(JobResponse::from_job(job, &state.display_tz)))
}

pub async fn replay_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.queue_service.replay(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("replayable job {}", id)))
    }
}

#[derive(Debug, Deserialize)]
pub struct DueQuery {
    pub limit: Option<i64>,
}

pub async fn due_jobs(
    State(state): State<AppState>,
    Query(query): Query<DueQuery>,
) -> ApiResult<Json<Vec<JobResponse>>> {
    let jobs = state
        .queue_service
        .due_jobs(query.limit.unwrap_or(50))
        .await?;
    Ok(Json(
        jobs.into_iter()
            .map(|job| JobResponse::from_job(job, &state.display_tz))
            .collect(),
    ))
}

pub async fn running_channels(
    State(state): State<AppState>,
) -> ApiResult<Json<HashMap<String, i64>>> {
    Ok(Json(state.queue_service.running_channels().await?))
}

fn parse_status(s: &str) -> ApiResult<JobStatus> {
    match s {
        "pending" => Ok(JobStatus::Pending),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(ApiError::BadRequest(format!(
            "unknown status filter '{}'",
            other
        ))),
    }
}
