//! In-process harness for router tests.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header::CONTENT_TYPE, request::Builder},
    response::Response,
};
use db::DBService;
use secrecy::SecretString;
use serde_json::Value;
use services::services::{
    assistant::AssistantService,
    claude_api::ChatModel,
    notification::{NotificationService, testing::RecordingSender},
};
use tower::ServiceExt;

use crate::{config::Config, routes, state::AppState};

const CRON_SECRET: &str = "test-cron-secret";

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        database_max_connections: 1,
        cron_secret: Some(SecretString::from(CRON_SECRET.to_string())),
        cron_trusted_header: Some("x-cron-trigger".to_string()),
        reminder_scheduler_enabled: false,
        reminder_interval: std::time::Duration::from_secs(300),
        whatsapp: None,
        claude: None,
        session_ttl: chrono::Duration::hours(1),
        sentry_dsn: None,
        cors_origins: Vec::new(),
    }
}

pub fn request(method: Method, uri: &str) -> Builder {
    Request::builder().method(method).uri(uri)
}

pub struct TestApp {
    pub state: AppState,
    pub sender: Arc<RecordingSender>,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(test_config(), None).await
    }

    pub async fn with_config(config: Config) -> Self {
        Self::build(config, None).await
    }

    pub async fn with_assistant(model: Arc<dyn ChatModel>) -> Self {
        Self::build(test_config(), Some(model)).await
    }

    async fn build(config: Config, model: Option<Arc<dyn ChatModel>>) -> Self {
        let db = DBService::new_in_memory().await.unwrap();
        let sender = Arc::new(RecordingSender::default());
        let notifications = NotificationService::new(sender.clone());
        let assistant = model.map(|m| AssistantService::new(db.pool.clone(), m));
        let state = AppState::with_services(db, config, notifications, assistant);
        let router = routes::router(state.clone());
        Self { state, sender, router }
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        self.state.pool()
    }

    async fn call(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn into_json(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                panic!("response body is not JSON ({e}): {}", String::from_utf8_lossy(&bytes))
            })
        };
        (status, body)
    }

    pub async fn send(&self, builder: Builder) -> (StatusCode, Value) {
        let response = self.call(builder.body(Body::empty()).unwrap()).await;
        Self::into_json(response).await
    }

    pub async fn send_json(&self, builder: Builder, body: Value) -> (StatusCode, Value) {
        let response = self.send_raw_json(builder, body).await;
        Self::into_json(response).await
    }

    pub async fn send_raw_json(&self, builder: Builder, body: Value) -> Response {
        let request = builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.call(request).await
    }
}
