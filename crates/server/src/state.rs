use std::sync::Arc;

use db::DBService;
use services::services::{
    assistant::AssistantService,
    claude_api::ClaudeApiClient,
    notification::NotificationService,
    onboarding::OnboardingService,
};
use tracing::warn;

use crate::config::Config;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub config: Arc<Config>,
    pub notifications: NotificationService,
    pub onboarding: OnboardingService,
    /// `None` when no assistant API key is configured.
    pub assistant: Option<AssistantService>,
}

impl AppState {
    pub fn new(db: DBService, config: Config) -> anyhow::Result<Self> {
        let notifications = NotificationService::from_config(config.whatsapp.clone())?;

        let assistant = match config.claude.clone() {
            Some(claude) => Some(AssistantService::new(
                db.pool.clone(),
                Arc::new(ClaudeApiClient::new(claude)?),
            )),
            None => {
                warn!("ANTHROPIC_API_KEY not set - assistant endpoint will answer 503");
                None
            }
        };

        Ok(Self::with_services(db, config, notifications, assistant))
    }

    pub fn with_services(
        db: DBService,
        config: Config,
        notifications: NotificationService,
        assistant: Option<AssistantService>,
    ) -> Self {
        let onboarding = OnboardingService::new(db.pool.clone(), notifications.clone());
        Self {
            db,
            config: Arc::new(config),
            notifications,
            onboarding,
            assistant,
        }
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.db.pool
    }
}
