use axum::{
    Router,
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Json as ResponseJson},
    routing::post,
};
use chrono::Utc;
use db::models::{cleaner::Cleaner, user::User};
use serde::Serialize;
use services::services::onboarding::{OnboardingStarted, StartOnboarding, VerifyOnboarding};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    error::ApiError,
    extract::Json,
    middleware::auth::session_cookie,
    state::AppState,
};

#[derive(Debug, Serialize, TS)]
pub struct OnboardedProfile {
    pub user: User,
    pub cleaner: Cleaner,
}

/// `POST /api/onboarding/start`
pub async fn start_onboarding(
    State(state): State<AppState>,
    Json(payload): Json<StartOnboarding>,
) -> Result<ResponseJson<ApiResponse<OnboardingStarted>>, ApiError> {
    let started = state.onboarding.start(&payload, Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(started)))
}

/// `POST /api/onboarding/verify`
///
/// Verify the code, create the cleaner account and log it in.
pub async fn verify_onboarding(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOnboarding>,
) -> Result<impl IntoResponse, ApiError> {
    let ttl = state.config.session_ttl;
    let done = state.onboarding.verify(&payload, ttl, Utc::now()).await?;

    Ok((
        [(SET_COOKIE, session_cookie(&done.session_token, ttl))],
        ResponseJson(ApiResponse::success(OnboardedProfile {
            user: done.user,
            cleaner: done.cleaner,
        })),
    ))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/onboarding",
        Router::new()
            .route("/start", post(start_onboarding))
            .route("/verify", post(verify_onboarding)),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode, header::SET_COOKIE};
    use serde_json::json;

    use crate::test_support::{TestApp, request};

    #[tokio::test]
    async fn test_onboarding_flow_sets_session_cookie() {
        let app = TestApp::new().await;

        let (status, body) = app
            .send_json(
                request(Method::POST, "/api/onboarding/start"),
                json!({"email": "lucia@example.com", "name": "Lucía Gómez", "phone": "+34 622 33 44 55"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let onboarding_id = body["data"]["onboarding_id"].as_str().unwrap().to_string();

        let (_, message) = app.sender.messages().pop().unwrap();
        let code = message
            .split(|c: char| !c.is_ascii_digit())
            .find(|p| p.len() == 6)
            .unwrap()
            .to_string();

        let response = app
            .send_raw_json(
                request(Method::POST, "/api/onboarding/verify"),
                json!({"onboarding_id": onboarding_id, "code": code}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));

        let token = cookie.trim_start_matches("session=").split(';').next().unwrap();
        let (status, body) = app
            .send(request(Method::GET, "/api/dashboard/stats").header("cookie", format!("session={token}")))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["role"], "CLEANER");
    }

    #[tokio::test]
    async fn test_wrong_code_is_bad_request() {
        let app = TestApp::new().await;
        let (_, body) = app
            .send_json(
                request(Method::POST, "/api/onboarding/start"),
                json!({"email": "ana@example.com", "name": "Ana", "phone": "+34622334455"}),
            )
            .await;
        let onboarding_id = body["data"]["onboarding_id"].as_str().unwrap().to_string();

        let (status, body) = app
            .send_json(
                request(Method::POST, "/api/onboarding/verify"),
                json!({"onboarding_id": onboarding_id, "code": "abcdef"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_start_rate_limited_per_phone() {
        let app = TestApp::new().await;
        let mut statuses = Vec::new();
        for i in 0..4 {
            let (status, _) = app
                .send_json(
                    request(Method::POST, "/api/onboarding/start"),
                    json!({"email": format!("u{i}@example.com"), "name": "Ana", "phone": "+34622334455"}),
                )
                .await;
            statuses.push(status);
        }
        assert_eq!(
            statuses,
            vec![StatusCode::OK, StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
    }
}
