//! Support assistant conversations.

use std::sync::Arc;

use db::models::support_conversation::{ConversationMessage, SupportConversation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::claude_api::{ChatModel, ClaudeApiError, Message};

/// Messages sent to the model per request, newest last.
pub const HISTORY_LIMIT: usize = 20;
pub const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("assistant request failed: {0}")]
    Upstream(#[from] ClaudeApiError),
    #[error("{0}")]
    Validation(String),
    #[error("conversation not found")]
    ConversationNotFound,
}

/// Part of the product the question is asked from; selects the system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssistantSurface {
    #[default]
    Public,
    Owner,
    Cleaner,
    Admin,
}

impl AssistantSurface {
    pub fn system_prompt(self) -> &'static str {
        match self {
            AssistantSurface::Public => {
                "You are the VillaCare assistant. VillaCare connects villa owners on the Spanish coast \
                 with vetted independent cleaners. Answer questions about how booking works, pricing \
                 (hourly rate times hours) and how cleaners can apply. Be brief and friendly, and reply \
                 in the language of the question."
            }
            AssistantSurface::Owner => {
                "You are the VillaCare assistant helping a villa owner. Owners add properties, book an \
                 active cleaner for a number of hours, can cancel pending or confirmed bookings, and \
                 review a cleaner once a booking is completed. Keep answers short and practical."
            }
            AssistantSurface::Cleaner => {
                "You are the VillaCare assistant helping a cleaner. Cleaners accept or decline booking \
                 requests, mark confirmed bookings as completed, and may lead a team of other cleaners. \
                 Unanswered requests trigger WhatsApp reminders. Keep answers short and practical."
            }
            AssistantSurface::Admin => {
                "You are the VillaCare operations assistant for platform administrators. Help with \
                 cleaner approvals, booking disputes, reminder and escalation settings, and the \
                 platform fee. Be precise."
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct ChatRequest {
    #[ts(optional)]
    pub conversation_id: Option<Uuid>,
    /// Defaults to the public surface.
    #[ts(optional)]
    pub surface: Option<AssistantSurface>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ChatReply {
    pub conversation_id: Uuid,
    pub reply: String,
}

/// The tail of `history` that is sent to the model: at most `HISTORY_LIMIT`
/// messages, starting with a user turn.
pub fn history_window(history: &[ConversationMessage]) -> Vec<Message> {
    let start = history.len().saturating_sub(HISTORY_LIMIT);
    history[start..]
        .iter()
        .skip_while(|m| m.role != "user")
        .map(|m| Message {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect()
}

#[derive(Clone)]
pub struct AssistantService {
    pool: SqlitePool,
    model: Arc<dyn ChatModel>,
}

impl AssistantService {
    pub fn new(pool: SqlitePool, model: Arc<dyn ChatModel>) -> Self {
        Self { pool, model }
    }

    pub async fn chat(&self, user_id: Option<Uuid>, req: &ChatRequest) -> Result<ChatReply, AssistantError> {
        let text = req.message.trim();
        if text.is_empty() {
            return Err(AssistantError::Validation("message is required".to_string()));
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AssistantError::Validation(format!(
                "message is longer than {MAX_MESSAGE_CHARS} characters"
            )));
        }

        let requested = req.surface.unwrap_or_default();
        let conversation = match req.conversation_id {
            Some(id) => SupportConversation::find_by_id(&self.pool, id)
                .await?
                .filter(|c| c.user_id.is_none() || c.user_id == user_id)
                .ok_or(AssistantError::ConversationNotFound)?,
            None => SupportConversation::create(&self.pool, user_id, &requested.to_string()).await?,
        };
        let surface = conversation.surface.parse().unwrap_or(requested);

        let mut history = conversation.parsed_messages();
        history.push(ConversationMessage {
            role: "user".to_string(),
            content: text.to_string(),
        });

        let reply = self
            .model
            .reply(surface.system_prompt(), &history_window(&history))
            .await
            .inspect_err(|e| warn!(conversation_id = %conversation.id, error = %e, "Assistant reply failed"))?;

        history.push(ConversationMessage {
            role: "assistant".to_string(),
            content: reply.clone(),
        });
        SupportConversation::update_messages(&self.pool, conversation.id, &history).await?;

        info!(conversation_id = %conversation.id, %surface, turns = history.len(), "Assistant replied");
        Ok(ChatReply {
            conversation_id: conversation.id,
            reply,
        })
    }
}
