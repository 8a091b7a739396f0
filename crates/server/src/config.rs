//! Process configuration read from the environment (and `.env`).

use std::time::Duration;

use secrecy::SecretString;
use services::services::{claude_api::ClaudeConfig, notification::WhatsAppConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{0} is set but {1} is missing")]
    Incomplete(&'static str, &'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// Bearer secret for `/api/cron/*`. `None` disables the bearer path.
    pub cron_secret: Option<SecretString>,
    /// Header set by the trusted scheduler (value `1`). `None` disables it.
    pub cron_trusted_header: Option<String>,
    pub reminder_scheduler_enabled: bool,
    pub reminder_interval: Duration,
    pub whatsapp: Option<WhatsAppConfig>,
    pub claude: Option<ClaudeConfig>,
    pub session_ttl: chrono::Duration,
    pub sentry_dsn: Option<String>,
    pub cors_origins: Vec<String>,
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key,
            value: other.to_string(),
        }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(raw: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| raw(key).filter(|v| !v.trim().is_empty());

        let whatsapp = match (
            lookup("TWILIO_ACCOUNT_SID"),
            lookup("TWILIO_AUTH_TOKEN"),
            lookup("TWILIO_WHATSAPP_FROM"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(WhatsAppConfig {
                account_sid,
                auth_token: SecretString::from(auth_token),
                from_number,
            }),
            (None, None, None) => None,
            (Some(_), None, _) => return Err(ConfigError::Incomplete("TWILIO_ACCOUNT_SID", "TWILIO_AUTH_TOKEN")),
            (Some(_), _, None) => return Err(ConfigError::Incomplete("TWILIO_ACCOUNT_SID", "TWILIO_WHATSAPP_FROM")),
            (None, _, _) => return Err(ConfigError::Incomplete("TWILIO_AUTH_TOKEN", "TWILIO_ACCOUNT_SID")),
        };

        let claude = lookup("ANTHROPIC_API_KEY").map(|key| ClaudeConfig {
            api_key: SecretString::from(key),
            model: lookup("ANTHROPIC_MODEL"),
        });

        let session_ttl_hours: i64 = parse_or(&lookup, "SESSION_TTL_HOURS", 24 * 30)?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_HOURS",
                value: session_ttl_hours.to_string(),
            });
        }
        let reminder_interval_secs: u64 = parse_or(&lookup, "REMINDER_INTERVAL_SECS", 600)?;
        if reminder_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "REMINDER_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        // Off unless named; only enable it behind a proxy that strips the header.
        let cron_trusted_header = match raw("CRON_TRUSTED_HEADER") {
            Some(v) if !v.trim().is_empty() && !v.trim().eq_ignore_ascii_case("none") => {
                Some(v.trim().to_ascii_lowercase())
            }
            _ => None,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://villacare.db".to_string()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            cron_secret: lookup("CRON_SECRET").map(SecretString::from),
            cron_trusted_header,
            reminder_scheduler_enabled: parse_bool(&lookup, "REMINDER_SCHEDULER_ENABLED", false)?,
            reminder_interval: Duration::from_secs(reminder_interval_secs),
            whatsapp,
            claude,
            session_ttl: chrono::Duration::hours(session_ttl_hours),
            sentry_dsn: lookup("SENTRY_DSN"),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}
