use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::domain::entities::BreakerState;
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};

pub async fn list_breakers(State(state): State<AppState>) -> ApiResult<Json<Vec<BreakerState>>> {
    Ok(Json(state.breakers.all_stats().await?))
}

pub async fn reset_breaker(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> ApiResult<StatusCode> {
    if state.breakers.reset(&service).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("circuit breaker {}", service)))
    }
}
