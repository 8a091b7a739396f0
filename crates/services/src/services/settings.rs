use db::models::{
    audit_log::AuditLog,
    platform_settings::{PlatformSettings, UpdatePlatformSettings},
};
use serde_json::json;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::notification::normalize_phone;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
}

/// Merge `update` onto `current` and validate the result.
pub fn merge_settings(
    current: &PlatformSettings,
    update: &UpdatePlatformSettings,
) -> Result<(i64, i64, Option<String>, i64), SettingsError> {
    let reminder = update.reminder_after_minutes.unwrap_or(current.reminder_after_minutes);
    let escalate = update.escalate_after_minutes.unwrap_or(current.escalate_after_minutes);
    let fee = update.platform_fee_percent.unwrap_or(current.platform_fee_percent);

    if reminder <= 0 {
        return Err(SettingsError::Validation("reminder_after_minutes must be positive".to_string()));
    }
    if escalate <= reminder {
        return Err(SettingsError::Validation(
            "escalate_after_minutes must be greater than reminder_after_minutes".to_string(),
        ));
    }
    if !(0..=100).contains(&fee) {
        return Err(SettingsError::Validation("platform_fee_percent must be between 0 and 100".to_string()));
    }

    // An empty string clears the alert phone.
    let phone = match update.admin_alert_phone.as_deref().map(str::trim) {
        None => current.admin_alert_phone.clone(),
        Some("") => None,
        Some(raw) => Some(
            normalize_phone(raw)
                .ok_or_else(|| SettingsError::Validation("invalid admin_alert_phone".to_string()))?,
        ),
    };

    Ok((reminder, escalate, phone, fee))
}

pub async fn update_settings(
    pool: &SqlitePool,
    actor_id: Uuid,
    update: &UpdatePlatformSettings,
) -> Result<PlatformSettings, SettingsError> {
    let current = PlatformSettings::get(pool).await?;
    let (reminder, escalate, phone, fee) = merge_settings(&current, update)?;

    let saved = PlatformSettings::save(pool, reminder, escalate, phone.as_deref(), fee).await?;
    AuditLog::create(
        pool,
        Some(actor_id),
        "settings.update",
        "platform_settings",
        None,
        Some(json!({
            "reminder_after_minutes": saved.reminder_after_minutes,
            "escalate_after_minutes": saved.escalate_after_minutes,
            "admin_alert_phone": saved.admin_alert_phone,
            "platform_fee_percent": saved.platform_fee_percent,
        })),
    )
    .await?;

    info!(actor_id = %actor_id, "Platform settings updated");
    Ok(saved)
}
