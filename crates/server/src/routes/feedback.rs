use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use db::models::feedback::{CreateFeedback, Feedback};
use tracing::info;
use utils::response::ApiResponse;

use crate::{
    error::ApiError,
    extract::Json,
    middleware::auth::MaybeUser,
    state::AppState,
};

const CATEGORIES: &[&str] = &["bug", "idea", "question", "other"];
const MAX_MESSAGE_CHARS: usize = 5000;

fn validate(data: &CreateFeedback) -> Result<(), ApiError> {
    if !CATEGORIES.contains(&data.category.trim()) {
        return Err(ApiError::BadRequest(format!(
            "category must be one of: {}",
            CATEGORIES.join(", ")
        )));
    }
    let len = data.message.trim().chars().count();
    if len == 0 || len > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "message must be 1 to {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(())
}

/// `POST /api/feedback`
pub async fn submit_feedback(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(payload): Json<CreateFeedback>,
) -> Result<ResponseJson<ApiResponse<Feedback>>, ApiError> {
    validate(&payload)?;
    let feedback = Feedback::create(state.pool(), user.as_ref().map(|u| u.id), &payload).await?;
    info!(feedback_id = %feedback.id, category = %feedback.category, "Feedback received");
    Ok(ResponseJson(ApiResponse::success(feedback)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/feedback", post(submit_feedback))
}
