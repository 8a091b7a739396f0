//! Owner and cleaner dashboard endpoints.

use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::Utc;
use db::models::{
    booking::Booking,
    cleaner::{Cleaner, CleanerWithUser},
    property::{CreateProperty, Property},
    review::{CreateReview, Review},
    team::Team,
};
use serde::{Deserialize, Serialize};
use services::services::{
    bookings::{self, BookingAction, BookingActor, NewBookingRequest},
    stats::{CleanerStats, OwnerStats, load_cleaner_stats, load_owner_stats},
    teams::{self, TeamOverview},
};
use tracing::warn;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    error::ApiError,
    extract::{Json, Path},
    middleware::auth::DashboardUser,
    state::AppState,
};

#[derive(Debug, Serialize, TS)]
#[serde(tag = "role", content = "stats", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashboardStats {
    Owner(OwnerStats),
    Cleaner(CleanerStats),
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateTeamRequest {
    pub name: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct AddTeamMemberRequest {
    pub slug: String,
}

/// `GET /api/dashboard/stats`
pub async fn get_stats(
    State(state): State<AppState>,
    actor: DashboardUser,
) -> Result<ResponseJson<ApiResponse<DashboardStats>>, ApiError> {
    let now = Utc::now();
    let stats = match &actor {
        DashboardUser::Owner { owner, .. } => {
            DashboardStats::Owner(load_owner_stats(state.pool(), owner.id, now).await?)
        }
        DashboardUser::Cleaner { cleaner, .. } => {
            DashboardStats::Cleaner(load_cleaner_stats(state.pool(), cleaner.id, now).await?)
        }
    };
    Ok(ResponseJson(ApiResponse::success(stats)))
}

/// `GET /api/dashboard/bookings`
pub async fn list_bookings(
    State(state): State<AppState>,
    actor: DashboardUser,
) -> Result<ResponseJson<ApiResponse<Vec<Booking>>>, ApiError> {
    let bookings = match &actor {
        DashboardUser::Owner { owner, .. } => Booking::find_by_owner_id(state.pool(), owner.id).await?,
        DashboardUser::Cleaner { cleaner, .. } => {
            Booking::find_by_cleaner_id(state.pool(), cleaner.id).await?
        }
    };
    Ok(ResponseJson(ApiResponse::success(bookings)))
}

/// `POST /api/dashboard/bookings`
pub async fn create_booking(
    State(state): State<AppState>,
    actor: DashboardUser,
    Json(payload): Json<NewBookingRequest>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    let owner = actor.owner()?;
    let booking = bookings::create_booking(state.pool(), owner.id, &payload, Utc::now()).await?;

    // The request itself succeeded; a failed heads-up only gets logged and
    // the reminder job follows up later.
    if let Some(cleaner) = Cleaner::find_with_user(state.pool(), booking.cleaner_id).await? {
        notify_new_booking(&state, &cleaner, &booking, &actor.user().name).await;
    }

    Ok(ResponseJson(ApiResponse::success(booking)))
}

async fn notify_new_booking(state: &AppState, cleaner: &CleanerWithUser, booking: &Booking, owner_name: &str) {
    let Some(phone) = cleaner.phone.as_deref() else {
        return;
    };
    let body = format!(
        "Hi {}, {} requested a {} clean on {} ({} h). Open your VillaCare dashboard to accept or decline.",
        cleaner.name,
        owner_name,
        booking.service_type.replace('_', " "),
        booking.scheduled_for.format("%a %d %b %H:%M"),
        booking.hours,
    );
    if let Err(e) = state.notifications.send(phone, &body).await {
        warn!(booking_id = %booking.id, error = %e, "New booking notification failed");
    }
}

async fn cleaner_action(
    state: &AppState,
    actor: &DashboardUser,
    booking_id: Uuid,
    action: BookingAction,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    let cleaner = actor.cleaner()?;
    let booking =
        bookings::apply_action(state.pool(), booking_id, BookingActor::Cleaner(cleaner.id), action).await?;
    Ok(ResponseJson(ApiResponse::success(booking)))
}

/// `POST /api/dashboard/bookings/{booking_id}/accept`
pub async fn accept_booking(
    State(state): State<AppState>,
    actor: DashboardUser,
    Path(booking_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    cleaner_action(&state, &actor, booking_id, BookingAction::Accept).await
}

/// `POST /api/dashboard/bookings/{booking_id}/decline`
pub async fn decline_booking(
    State(state): State<AppState>,
    actor: DashboardUser,
    Path(booking_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    cleaner_action(&state, &actor, booking_id, BookingAction::Decline).await
}

/// `POST /api/dashboard/bookings/{booking_id}/complete`
pub async fn complete_booking(
    State(state): State<AppState>,
    actor: DashboardUser,
    Path(booking_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    cleaner_action(&state, &actor, booking_id, BookingAction::Complete).await
}

/// `POST /api/dashboard/bookings/{booking_id}/cancel`
pub async fn cancel_booking(
    State(state): State<AppState>,
    actor: DashboardUser,
    Path(booking_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    let owner = actor.owner()?;
    let booking = bookings::apply_action(
        state.pool(),
        booking_id,
        BookingActor::Owner(owner.id),
        BookingAction::Cancel,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(booking)))
}

/// `POST /api/dashboard/bookings/{booking_id}/review`
pub async fn review_booking(
    State(state): State<AppState>,
    actor: DashboardUser,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CreateReview>,
) -> Result<ResponseJson<ApiResponse<Review>>, ApiError> {
    let owner = actor.owner()?;
    let review = bookings::review_booking(state.pool(), owner.id, booking_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(review)))
}

/// `GET /api/dashboard/properties`
pub async fn list_properties(
    State(state): State<AppState>,
    actor: DashboardUser,
) -> Result<ResponseJson<ApiResponse<Vec<Property>>>, ApiError> {
    let owner = actor.owner()?;
    let properties = Property::find_by_owner_id(state.pool(), owner.id).await?;
    Ok(ResponseJson(ApiResponse::success(properties)))
}

/// `POST /api/dashboard/properties`
pub async fn create_property(
    State(state): State<AppState>,
    actor: DashboardUser,
    Json(payload): Json<CreateProperty>,
) -> Result<ResponseJson<ApiResponse<Property>>, ApiError> {
    let owner = actor.owner()?;
    if payload.name.trim().is_empty() || payload.address.trim().is_empty() {
        return Err(ApiError::BadRequest("name and address are required".to_string()));
    }
    if payload.bedrooms.is_some_and(|n| n < 0) || payload.bathrooms.is_some_and(|n| n < 0) {
        return Err(ApiError::BadRequest("room counts cannot be negative".to_string()));
    }
    let property = Property::create(state.pool(), owner.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(property)))
}

/// `GET /api/dashboard/team`
pub async fn get_team(
    State(state): State<AppState>,
    actor: DashboardUser,
) -> Result<ResponseJson<ApiResponse<Option<TeamOverview>>>, ApiError> {
    let cleaner = actor.cleaner()?;
    let overview = teams::team_overview(state.pool(), cleaner).await?;
    Ok(ResponseJson(ApiResponse::success(overview)))
}

/// `POST /api/dashboard/team`
pub async fn create_team(
    State(state): State<AppState>,
    actor: DashboardUser,
    Json(payload): Json<CreateTeamRequest>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let cleaner = actor.cleaner()?;
    let team = teams::create_team(state.pool(), cleaner, &payload.name).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

/// `POST /api/dashboard/team/members`
pub async fn add_team_member(
    State(state): State<AppState>,
    actor: DashboardUser,
    Json(payload): Json<AddTeamMemberRequest>,
) -> Result<ResponseJson<ApiResponse<Cleaner>>, ApiError> {
    let cleaner = actor.cleaner()?;
    let member = teams::add_member(state.pool(), cleaner, &payload.slug).await?;
    Ok(ResponseJson(ApiResponse::success(member)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/dashboard",
        Router::new()
            .route("/stats", get(get_stats))
            .route("/bookings", get(list_bookings).post(create_booking))
            .route("/bookings/{booking_id}/accept", post(accept_booking))
            .route("/bookings/{booking_id}/decline", post(decline_booking))
            .route("/bookings/{booking_id}/complete", post(complete_booking))
            .route("/bookings/{booking_id}/cancel", post(cancel_booking))
            .route("/bookings/{booking_id}/review", post(review_booking))
            .route("/properties", get(list_properties).post(create_property))
            .route("/team", get(get_team).post(create_team))
            .route("/team/members", post(add_team_member)),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::Duration;
    use db::{
        models::cleaner::CleanerStatus,
        test_utils::{create_admin, create_booking, create_cleaner, create_owner, login},
    };
    use serde_json::json;

    use crate::test_support::{TestApp, request};

    fn with_session(uri: &str, method: Method, token: &str) -> axum::http::request::Builder {
        request(method, uri).header("cookie", format!("session={token}"))
    }

    #[tokio::test]
    async fn test_requires_session_and_non_admin_role() {
        let app = TestApp::new().await;

        let (status, body) = app.send(request(Method::GET, "/api/dashboard/stats")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = app
            .send(request(Method::GET, "/api/dashboard/stats").header("cookie", "session=not-a-real-token"))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let admin = create_admin(app.pool(), "Ada").await;
        let token = login(app.pool(), admin.id).await;
        let (status, _) = app.send(with_session("/api/dashboard/stats", Method::GET, &token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_owner_books_cleaner_accepts_completes_owner_reviews() {
        let app = TestApp::new().await;
        let owner = create_owner(app.pool(), "Olivia").await;
        let cleaner = create_cleaner(app.pool(), "Carmen", Some("+34611111111"), CleanerStatus::Active).await;
        let owner_token = login(app.pool(), owner.user.id).await;
        let cleaner_token = login(app.pool(), cleaner.user.id).await;

        let (status, body) = app
            .send_json(
                with_session("/api/dashboard/bookings", Method::POST, &owner_token),
                json!({
                    "cleaner_id": cleaner.cleaner.id,
                    "property_id": owner.property.id,
                    "service_type": "regular_clean",
                    "scheduled_for": (chrono::Utc::now() + Duration::days(3)).to_rfc3339(),
                    "hours": 3.0,
                    "notes": null
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["price_cents"], 6000);
        assert_eq!(app.sender.messages().len(), 1);
        let booking_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .send(with_session(&format!("/api/dashboard/bookings/{booking_id}/accept"), Method::POST, &owner_token))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        for step in ["accept", "complete"] {
            let (status, _) = app
                .send(with_session(&format!("/api/dashboard/bookings/{booking_id}/{step}"), Method::POST, &cleaner_token))
                .await;
            assert_eq!(status, StatusCode::OK, "{step}");
        }

        let review_uri = format!("/api/dashboard/bookings/{booking_id}/review");
        let (status, _) = app
            .send_json(with_session(&review_uri, Method::POST, &owner_token), json!({"rating": 5, "comment": "Perfect"}))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .send_json(with_session(&review_uri, Method::POST, &owner_token), json!({"rating": 4, "comment": null}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (_, body) = app.send(with_session("/api/dashboard/stats", Method::GET, &cleaner_token)).await;
        assert_eq!(body["data"]["role"], "CLEANER");
        assert_eq!(body["data"]["stats"]["review_count"], 1);
    }

    #[tokio::test]
    async fn test_illegal_transition_is_bad_request() {
        let app = TestApp::new().await;
        let owner = create_owner(app.pool(), "Olivia").await;
        let cleaner = create_cleaner(app.pool(), "Carmen", None, CleanerStatus::Active).await;
        let booking = create_booking(app.pool(), &owner, &cleaner, chrono::Utc::now()).await;
        let cleaner_token = login(app.pool(), cleaner.user.id).await;

        let (status, body) = app
            .send(with_session(&format!("/api/dashboard/bookings/{}/complete", booking.id), Method::POST, &cleaner_token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "cannot move booking from PENDING to COMPLETED");
    }

    #[tokio::test]
    async fn test_malformed_input_uses_error_envelope() {
        let app = TestApp::new().await;
        let owner = create_owner(app.pool(), "Olivia").await;
        let cleaner = create_cleaner(app.pool(), "Carmen", None, CleanerStatus::Active).await;
        let owner_token = login(app.pool(), owner.user.id).await;

        let (status, body) = app
            .send_json(
                with_session("/api/dashboard/bookings", Method::POST, &owner_token),
                json!({
                    "cleaner_id": cleaner.cleaner.id,
                    "property_id": owner.property.id,
                    "scheduled_for": (chrono::Utc::now() + Duration::days(3)).to_rfc3339(),
                    "hours": 3.0
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("service_type"));
        assert!(app.sender.messages().is_empty());

        let (status, body) = app
            .send(with_session("/api/dashboard/bookings/not-a-uuid/cancel", Method::POST, &owner_token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_owner_only_and_cleaner_only_sections() {
        let app = TestApp::new().await;
        let owner = create_owner(app.pool(), "Olivia").await;
        let cleaner = create_cleaner(app.pool(), "Carmen", None, CleanerStatus::Active).await;
        let owner_token = login(app.pool(), owner.user.id).await;
        let cleaner_token = login(app.pool(), cleaner.user.id).await;

        let (status, _) = app.send(with_session("/api/dashboard/team", Method::GET, &owner_token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.send(with_session("/api/dashboard/properties", Method::GET, &cleaner_token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send_json(
                with_session("/api/dashboard/properties", Method::POST, &owner_token),
                json!({"name": "Casa Azul", "address": "Av. del Puerto 4, Dénia", "bedrooms": 4, "bathrooms": 3, "notes": null}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["bedrooms"], 4);

        let (status, body) = app
            .send_json(with_session("/api/dashboard/team", Method::POST, &cleaner_token), json!({"name": "Equipo Sol"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["leader_id"], cleaner.cleaner.id.to_string());
    }
}
