//! Admin console endpoints. Everything here sits behind `require_admin`.

use axum::{
    Extension, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use db::models::{
    audit_log::AuditLog,
    booking::{Booking, BookingStatus},
    cleaner::{Cleaner, CleanerStatus, CleanerWithUser},
    feedback::Feedback,
    platform_settings::{PlatformSettings, UpdatePlatformSettings},
    user::User,
};
use serde::Deserialize;
use serde_json::json;
use services::services::{
    bookings::{self, BookingAction, BookingActor},
    settings,
    stats::{AdminStats, DateRange, load_admin_stats},
};
use tracing::{info, warn};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::auth::require_admin,
    state::AppState,
};

const MAX_LIST: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Trailing window in days. Takes precedence over `from`/`to`.
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CleanerListQuery {
    pub status: Option<CleanerStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CleanerStatusRequest {
    pub status: CleanerStatus,
}

const MAX_STATS_DAYS: i64 = 366;

fn stats_range(query: &StatsQuery, now: DateTime<Utc>) -> Result<DateRange, ApiError> {
    if let Some(days) = query.days {
        if !(1..=MAX_STATS_DAYS).contains(&days) {
            return Err(ApiError::BadRequest(format!("`days` must be between 1 and {MAX_STATS_DAYS}")));
        }
        return Ok(DateRange::last_days(now, days));
    }
    let month = DateRange::current_month(now);
    let start = query.from.unwrap_or(month.start);
    let end = query.to.unwrap_or(month.end);
    DateRange::new(start, end).ok_or_else(|| ApiError::BadRequest("`from` must be before `to`".to_string()))
}

/// `GET /api/admin/stats`
pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<ResponseJson<ApiResponse<AdminStats>>, ApiError> {
    let range = stats_range(&query, Utc::now())?;
    let stats = load_admin_stats(state.pool(), range).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

/// `GET /api/admin/bookings`
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Booking>>>, ApiError> {
    let limit = query.limit.unwrap_or(MAX_LIST).clamp(1, MAX_LIST);
    let bookings = Booking::list(state.pool(), query.status, limit).await?;
    Ok(ResponseJson(ApiResponse::success(bookings)))
}

/// `POST /api/admin/bookings/{booking_id}/cancel`
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(booking_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    let booking =
        bookings::apply_action(state.pool(), booking_id, BookingActor::Admin, BookingAction::Cancel).await?;
    AuditLog::create(
        state.pool(),
        Some(admin.id),
        "booking.cancel",
        "booking",
        Some(booking.id),
        None,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(booking)))
}

/// `GET /api/admin/cleaners`
pub async fn list_cleaners(
    State(state): State<AppState>,
    Query(query): Query<CleanerListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<CleanerWithUser>>>, ApiError> {
    let cleaners = Cleaner::list_with_users(state.pool(), query.status).await?;
    Ok(ResponseJson(ApiResponse::success(cleaners)))
}

/// `POST /api/admin/cleaners/{cleaner_id}/status`
pub async fn set_cleaner_status(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Path(cleaner_id): Path<Uuid>,
    Json(payload): Json<CleanerStatusRequest>,
) -> Result<ResponseJson<ApiResponse<Cleaner>>, ApiError> {
    let before = Cleaner::find_with_user(state.pool(), cleaner_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("cleaner not found".to_string()))?;
    let updated = Cleaner::update_status(state.pool(), cleaner_id, payload.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("cleaner not found".to_string()))?;

    AuditLog::create(
        state.pool(),
        Some(admin.id),
        "cleaner.status",
        "cleaner",
        Some(cleaner_id),
        Some(json!({ "from": before.cleaner.status, "to": updated.status })),
    )
    .await?;
    info!(cleaner_id = %cleaner_id, from = %before.cleaner.status, to = %updated.status, "Cleaner status changed");

    if before.cleaner.status != CleanerStatus::Active && updated.status == CleanerStatus::Active {
        if let Some(phone) = before.phone.as_deref() {
            let body = format!(
                "Hi {}, your VillaCare profile is approved. Your public page: /{}",
                before.name, updated.slug
            );
            if let Err(e) = state.notifications.send(phone, &body).await {
                warn!(cleaner_id = %cleaner_id, error = %e, "Approval notification failed");
            }
        }
    }

    Ok(ResponseJson(ApiResponse::success(updated)))
}

/// `GET /api/admin/settings`
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<PlatformSettings>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(PlatformSettings::get(state.pool()).await?)))
}

/// `PUT /api/admin/settings`
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    Json(payload): Json<UpdatePlatformSettings>,
) -> Result<ResponseJson<ApiResponse<PlatformSettings>>, ApiError> {
    let saved = settings::update_settings(state.pool(), admin.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(saved)))
}

/// `GET /api/admin/feedback`
pub async fn list_feedback(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Feedback>>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(Feedback::list_recent(state.pool(), MAX_LIST).await?)))
}

/// `GET /api/admin/audit-logs`
pub async fn list_audit_logs(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<AuditLog>>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(AuditLog::list_recent(state.pool(), MAX_LIST).await?)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let inner = Router::new()
        .route("/stats", get(get_stats))
        .route("/bookings", get(list_bookings))
        .route("/bookings/{booking_id}/cancel", post(cancel_booking))
        .route("/cleaners", get(list_cleaners))
        .route("/cleaners/{cleaner_id}/status", post(set_cleaner_status))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/feedback", get(list_feedback))
        .route("/audit-logs", get(list_audit_logs))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new().nest("/admin", inner)
}
