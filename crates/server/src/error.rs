use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use services::services::{
    assistant::AssistantError,
    booking_reminder::BookingReminderError,
    bookings::BookingError,
    onboarding::OnboardingError,
    settings::SettingsError,
    slug::SlugError,
    teams::TeamError,
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Onboarding(#[from] OnboardingError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Team(#[from] TeamError),
    #[error(transparent)]
    Assistant(#[from] AssistantError),
    #[error(transparent)]
    Reminder(#[from] BookingReminderError),
    #[error("{0}")]
    BadRequest(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

enum Reply {
    Status(StatusCode),
    Limited(u64),
    Internal,
}

fn database_reply(err: &sqlx::Error) -> Reply {
    if db::is_unique_violation(err) {
        Reply::Status(StatusCode::BAD_REQUEST)
    } else if matches!(err, sqlx::Error::RowNotFound) {
        Reply::Status(StatusCode::NOT_FOUND)
    } else {
        Reply::Internal
    }
}

impl ApiError {
    fn reply(&self) -> Reply {
        use Reply::*;
        match self {
            ApiError::Database(e) => database_reply(e),
            ApiError::BadRequest(_) => Status(StatusCode::BAD_REQUEST),
            ApiError::Unauthorized => Status(StatusCode::UNAUTHORIZED),
            ApiError::Forbidden => Status(StatusCode::FORBIDDEN),
            ApiError::NotFound(_) => Status(StatusCode::NOT_FOUND),
            ApiError::Unavailable(_) => Status(StatusCode::SERVICE_UNAVAILABLE),
            ApiError::Booking(e) => match e {
                BookingError::Database(e) => database_reply(e),
                BookingError::NotFound => Status(StatusCode::NOT_FOUND),
                BookingError::Forbidden => Status(StatusCode::FORBIDDEN),
                BookingError::Validation(_)
                | BookingError::InvalidTransition { .. }
                | BookingError::AlreadyReviewed => Status(StatusCode::BAD_REQUEST),
            },
            ApiError::Onboarding(e) => match e {
                OnboardingError::Database(e) => database_reply(e),
                OnboardingError::Slug(SlugError::Database(e)) => database_reply(e),
                OnboardingError::Slug(SlugError::Exhausted(_)) | OnboardingError::Delivery(_) => Internal,
                OnboardingError::RateLimited { retry_after_secs } => Limited(*retry_after_secs),
                OnboardingError::NotFound => Status(StatusCode::NOT_FOUND),
                OnboardingError::Validation(_)
                | OnboardingError::EmailTaken
                | OnboardingError::Expired
                | OnboardingError::InvalidCode
                | OnboardingError::TooManyAttempts => Status(StatusCode::BAD_REQUEST),
            },
            ApiError::Settings(e) => match e {
                SettingsError::Database(e) => database_reply(e),
                SettingsError::Validation(_) => Status(StatusCode::BAD_REQUEST),
            },
            ApiError::Team(e) => match e {
                TeamError::Database(e) => database_reply(e),
                TeamError::Validation(_) => Status(StatusCode::BAD_REQUEST),
                TeamError::NotLeader => Status(StatusCode::FORBIDDEN),
                TeamError::CleanerNotFound => Status(StatusCode::NOT_FOUND),
            },
            ApiError::Assistant(e) => match e {
                AssistantError::Database(e) => database_reply(e),
                AssistantError::Upstream(_) => Status(StatusCode::SERVICE_UNAVAILABLE),
                AssistantError::Validation(_) => Status(StatusCode::BAD_REQUEST),
                AssistantError::ConversationNotFound => Status(StatusCode::NOT_FOUND),
            },
            ApiError::Reminder(BookingReminderError::Database(e)) => database_reply(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.reply() {
            Reply::Status(status) => {
                let message = match (&self, status) {
                    (ApiError::Database(_), StatusCode::BAD_REQUEST) => "already exists".to_string(),
                    (ApiError::Database(_), StatusCode::NOT_FOUND) => "not found".to_string(),
                    (ApiError::Assistant(AssistantError::Upstream(_)), _) => {
                        error!(error = %self, "Assistant upstream failure");
                        "assistant temporarily unavailable".to_string()
                    }
                    _ => self.to_string(),
                };
                (status, Json(ApiResponse::<()>::error(message))).into_response()
            }
            Reply::Limited(retry_after_secs) => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(ApiResponse::<()>::error(self.to_string())),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            Reply::Internal => {
                error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::error("Internal server error")),
                )
                    .into_response()
            }
        }
    }
}
