use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use services::services::assistant::{ChatReply, ChatRequest};
use utils::response::ApiResponse;

use crate::{
    error::ApiError,
    extract::Json,
    middleware::auth::MaybeUser,
    state::AppState,
};

/// `POST /api/assistant/chat`
pub async fn chat(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(payload): Json<ChatRequest>,
) -> Result<ResponseJson<ApiResponse<ChatReply>>, ApiError> {
    let assistant = state
        .assistant
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("assistant is not configured".to_string()))?;
    let reply = assistant.chat(user.map(|u| u.id), &payload).await?;
    Ok(ResponseJson(ApiResponse::success(reply)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/assistant/chat", post(chat))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use services::services::claude_api::{ChatModel, ClaudeApiError, Message};

    use crate::test_support::{TestApp, request};

    struct CannedModel;

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn reply(&self, _system: &str, messages: &[Message]) -> Result<String, ClaudeApiError> {
            Ok(format!("You said: {}", messages.last().map(|m| m.content.as_str()).unwrap_or("")))
        }
    }

    struct DownModel;

    #[async_trait]
    impl ChatModel for DownModel {
        async fn reply(&self, _system: &str, _messages: &[Message]) -> Result<String, ClaudeApiError> {
            Err(ClaudeApiError::Http { status: 529, body: "overloaded".to_string() })
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_is_503() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send_json(request(Method::POST, "/api/assistant/chat"), json!({"message": "hola"}))
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_chat_replies_and_continues_conversation() {
        let app = TestApp::with_assistant(Arc::new(CannedModel)).await;
        let (status, body) = app
            .send_json(
                request(Method::POST, "/api/assistant/chat"),
                json!({"surface": "owner", "message": "How much is a deep clean?"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["reply"], "You said: How much is a deep clean?");

        let conversation_id = body["data"]["conversation_id"].clone();
        let (status, body) = app
            .send_json(
                request(Method::POST, "/api/assistant/chat"),
                json!({"conversation_id": conversation_id, "message": "Thanks"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["conversation_id"], conversation_id);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_503_with_generic_message() {
        let app = TestApp::with_assistant(Arc::new(DownModel)).await;
        let (status, body) = app
            .send_json(request(Method::POST, "/api/assistant/chat"), json!({"message": "hola"}))
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "assistant temporarily unavailable");
    }
}
