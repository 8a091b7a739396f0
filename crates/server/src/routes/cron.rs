//! Scheduler-triggered jobs. Both accept GET and POST so any cron provider
//! can call them.

use axum::{
    Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use chrono::Utc;
use services::services::{
    booking_reminder::{BookingReminderService, ReminderRunSummary},
    cleanup::{CleanupSummary, run_cleanup},
};
use tracing::info;
use utils::response::ApiResponse;

use crate::{error::ApiError, middleware::auth::require_cron, state::AppState};

/// `GET|POST /api/cron/booking-reminders`
pub async fn booking_reminders(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<ReminderRunSummary>>, ApiError> {
    let summary =
        BookingReminderService::run_once(state.pool(), &state.notifications, Utc::now()).await?;
    info!(?summary, "Cron booking reminders finished");
    Ok(ResponseJson(ApiResponse::success(summary)))
}

/// `GET|POST /api/cron/cleanup`
pub async fn cleanup(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<CleanupSummary>>, ApiError> {
    let summary = run_cleanup(state.pool(), Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/cron",
        Router::new()
            .route("/booking-reminders", get(booking_reminders).post(booking_reminders))
            .route("/cleanup", get(cleanup).post(cleanup))
            .route_layer(from_fn_with_state(state.clone(), require_cron)),
    )
}
