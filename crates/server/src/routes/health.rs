use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use services::services::health::{HealthReport, check_database};
use utils::response::ApiResponse;

use crate::{error::ApiError, state::AppState};

/// `GET /api/health`
pub async fn health(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<HealthReport>>, ApiError> {
    let report = check_database(state.pool()).await;
    if !report.is_healthy() {
        return Err(ApiError::Unavailable("database unavailable".to_string()));
    }
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/health", get(health))
}
