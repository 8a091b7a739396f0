//! Outbound messaging (WhatsApp through a Twilio-compatible REST API).

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Clone, Error)]
pub enum MessagingError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

impl MessagingError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Delivery channel for plain text messages to a phone number.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), MessagingError>;

    /// Short channel name used in logs.
    fn channel(&self) -> &'static str;
}

/// Credentials for the WhatsApp sender.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from_number: String,
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

/// Sends WhatsApp messages through the Twilio Messages API.
pub struct WhatsAppSender {
    http: Client,
    config: WhatsAppConfig,
    api_base: String,
}

impl WhatsAppSender {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

    pub fn new(config: WhatsAppConfig) -> Result<Self, MessagingError> {
        Self::with_api_base(config, TWILIO_API_BASE)
    }

    pub fn with_api_base(
        config: WhatsAppConfig,
        api_base: impl Into<String>,
    ) -> Result<Self, MessagingError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("villacare-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MessagingError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            config,
            api_base: api_base.into(),
        })
    }

    async fn send_once(&self, to: &str, body: &str) -> Result<String, MessagingError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base, self.config.account_sid
        );
        let params = [
            ("From", whatsapp_address(&self.config.from_number)),
            ("To", whatsapp_address(to)),
            ("Body", body.to_string()),
        ];

        let res = self
            .http
            .post(url)
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<TwilioMessageResponse>()
                .await
                .map(|r| r.sid)
                .map_err(|e| MessagingError::Transport(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(MessagingError::InvalidCredentials)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(MessagingError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(MessagingError::Http { status, body })
            }
        }
    }
}

#[async_trait]
impl MessageSender for WhatsAppSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), MessagingError> {
        let to = normalize_phone(to).ok_or_else(|| MessagingError::InvalidRecipient(to.to_string()))?;

        let sid = (|| async { self.send_once(&to, body).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_delay(Duration::from_secs(10))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &MessagingError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "WhatsApp send failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?;

        info!(to = %to, message_sid = %sid, "WhatsApp message sent");
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "whatsapp"
    }
}

/// Fallback when no messaging credentials are configured: the message is only
/// logged.
pub struct LogSender;

#[async_trait]
impl MessageSender for LogSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), MessagingError> {
        info!(to = %to, body = %body, "Messaging not configured, logging message instead");
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "log"
    }
}

/// Cheap-to-clone handle used by services and handlers.
#[derive(Clone)]
pub struct NotificationService {
    sender: Arc<dyn MessageSender>,
}

impl NotificationService {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self { sender }
    }

    /// WhatsApp when configured, log-only otherwise.
    pub fn from_config(config: Option<WhatsAppConfig>) -> Result<Self, MessagingError> {
        let sender: Arc<dyn MessageSender> = match config {
            Some(config) => Arc::new(WhatsAppSender::new(config)?),
            None => {
                warn!("WhatsApp credentials not set - outbound messages will only be logged");
                Arc::new(LogSender)
            }
        };
        Ok(Self::new(sender))
    }

    pub async fn send(&self, to: &str, body: &str) -> Result<(), MessagingError> {
        self.sender.send(to, body).await
    }

    pub fn channel(&self) -> &'static str {
        self.sender.channel()
    }
}

fn map_reqwest_error(e: reqwest::Error) -> MessagingError {
    if e.is_timeout() {
        MessagingError::Timeout
    } else {
        MessagingError::Transport(e.to_string())
    }
}

/// Strip spaces, dashes and parentheses; require a leading `+` and 8-15 digits.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("whatsapp:")
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();
    let digits = cleaned.strip_prefix('+')?;
    if (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(cleaned)
    } else {
        None
    }
}

fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every message instead of sending it. Numbers listed in
    /// `failing` return a transport error.
    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Mutex<Vec<(String, String)>>,
        pub failing: Mutex<Vec<String>>,
    }

    impl RecordingSender {
        pub fn messages(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }

        pub fn fail_for(&self, number: &str) {
            self.failing.lock().unwrap().push(number.to_string());
        }

        pub fn recover(&self) {
            self.failing.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, to: &str, body: &str) -> Result<(), MessagingError> {
            if self.failing.lock().unwrap().iter().any(|n| n == to) {
                return Err(MessagingError::Transport("simulated failure".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Ok(())
        }

        fn channel(&self) -> &'static str {
            "recording"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+34 600 11-22-33").as_deref(), Some("+34600112233"));
        assert_eq!(normalize_phone("whatsapp:+34600112233").as_deref(), Some("+34600112233"));
        assert_eq!(normalize_phone("600112233"), None);
        assert_eq!(normalize_phone("+34abc"), None);
        assert_eq!(normalize_phone("+123"), None);
    }

    #[test]
    fn test_whatsapp_address_prefix_added_once() {
        assert_eq!(whatsapp_address("+34600112233"), "whatsapp:+34600112233");
        assert_eq!(whatsapp_address("whatsapp:+34600112233"), "whatsapp:+34600112233");
    }

    #[test]
    fn test_retry_policy() {
        assert!(MessagingError::Timeout.should_retry());
        assert!(MessagingError::Http { status: 503, body: String::new() }.should_retry());
        assert!(!MessagingError::Http { status: 400, body: String::new() }.should_retry());
        assert!(!MessagingError::InvalidCredentials.should_retry());
    }
}
