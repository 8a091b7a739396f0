//! Reminds cleaners about bookings they have not answered and escalates the
//! ones that stay PENDING for too long.
//!
//! Each run looks at PENDING bookings old enough for at least a reminder and
//! places every booking in one of three age windows:
//!
//! * younger than `reminder_after`: nothing to do;
//! * between `reminder_after` and `escalate_after`: remind the cleaner;
//! * older than `escalate_after`: alert the admin.
//!
//! `(booking_id, kind)` is the idempotency key. A notification is recorded only
//! after it was delivered, so a failed send is retried by the next run, and a
//! booking is never messaged twice for the same kind by sequential runs.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use db::{
    DBService,
    models::{
        booking::{Booking, PendingBookingDetails},
        booking_notification::{BookingNotification, NotificationKind},
        platform_settings::PlatformSettings,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::time::interval;
use ts_rs::TS;
use tracing::{debug, error, info, warn};

use super::notification::NotificationService;

#[derive(Debug, Error)]
pub enum BookingReminderError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Age thresholds, measured from the booking's `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderThresholds {
    pub reminder_after: Duration,
    pub escalate_after: Duration,
}

impl ReminderThresholds {
    pub fn from_settings(settings: &PlatformSettings) -> Self {
        Self {
            reminder_after: Duration::minutes(settings.reminder_after_minutes),
            escalate_after: Duration::minutes(settings.escalate_after_minutes),
        }
    }
}

impl Default for ReminderThresholds {
    fn default() -> Self {
        Self {
            reminder_after: Duration::minutes(120),
            escalate_after: Duration::minutes(360),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderWindow {
    TooYoung,
    Reminder,
    Escalation,
}

impl ReminderWindow {
    pub fn notification_kind(self) -> Option<NotificationKind> {
        match self {
            ReminderWindow::TooYoung => None,
            ReminderWindow::Reminder => Some(NotificationKind::Reminder),
            ReminderWindow::Escalation => Some(NotificationKind::Escalation),
        }
    }
}

/// Place a booking in its age window.
pub fn classify(
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    thresholds: ReminderThresholds,
) -> ReminderWindow {
    let age = now - created_at;
    if age >= thresholds.escalate_after {
        ReminderWindow::Escalation
    } else if age >= thresholds.reminder_after {
        ReminderWindow::Reminder
    } else {
        ReminderWindow::TooYoung
    }
}

/// Outcome of one run, returned by the cron endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ReminderRunSummary {
    pub checked: u32,
    pub reminders_sent: u32,
    pub escalations_sent: u32,
    pub already_notified: u32,
    pub skipped: u32,
    pub failures: u32,
}

fn format_schedule(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y %H:%M UTC").to_string()
}

pub fn reminder_message(booking: &PendingBookingDetails) -> String {
    format!(
        "Hi {}, you have a cleaning request from {} for {} on {} that is still waiting for your answer. \
         Please accept or decline it from your dashboard.",
        booking.cleaner_name,
        booking.owner_name,
        booking.property_name,
        format_schedule(booking.scheduled_for),
    )
}

pub fn escalation_message(booking: &PendingBookingDetails, age: Duration) -> String {
    format!(
        "Booking {} ({} for {}, cleaner {}, scheduled {}) has been pending for {} hours without a response.",
        booking.id,
        booking.property_name,
        booking.owner_name,
        booking.cleaner_name,
        format_schedule(booking.scheduled_for),
        age.num_hours(),
    )
}

/// Background runner for the reminder job. The same logic is exposed to the
/// external scheduler through [`BookingReminderService::run_once`].
pub struct BookingReminderService {
    db: DBService,
    notification_service: NotificationService,
    poll_interval: StdDuration,
}

impl BookingReminderService {
    /// Spawn the in-process scheduler loop.
    pub async fn spawn(
        db: DBService,
        notification_service: NotificationService,
        poll_interval: StdDuration,
    ) -> tokio::task::JoinHandle<()> {
        let service = Self {
            db,
            notification_service,
            poll_interval,
        };
        tokio::spawn(async move {
            service.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting booking reminder service with interval {:?}",
            self.poll_interval
        );

        let mut interval = interval(self.poll_interval);

        loop {
            interval.tick().await;
            match Self::run_once(&self.db.pool, &self.notification_service, Utc::now()).await {
                Ok(summary) => debug!(?summary, "Booking reminder run complete"),
                Err(e) => error!("Error running booking reminders: {}", e),
            }
        }
    }

    /// One pass over the pending bookings as of `now`.
    pub async fn run_once(
        pool: &SqlitePool,
        notification_service: &NotificationService,
        now: DateTime<Utc>,
    ) -> Result<ReminderRunSummary, BookingReminderError> {
        let settings = PlatformSettings::get(pool).await?;
        let thresholds = ReminderThresholds::from_settings(&settings);

        let candidates =
            Booking::find_pending_created_before(pool, now - thresholds.reminder_after).await?;

        let mut summary = ReminderRunSummary::default();

        for booking in candidates {
            summary.checked += 1;

            let window = classify(booking.created_at, now, thresholds);
            let Some(kind) = window.notification_kind() else {
                continue;
            };

            if BookingNotification::exists(pool, booking.id, kind).await? {
                summary.already_notified += 1;
                continue;
            }

            let (recipient, body) = match kind {
                NotificationKind::Reminder => {
                    (booking.cleaner_phone.clone(), reminder_message(&booking))
                }
                NotificationKind::Escalation => (
                    settings.admin_alert_phone.clone(),
                    escalation_message(&booking, now - booking.created_at),
                ),
            };

            let Some(recipient) = recipient.filter(|r| !r.trim().is_empty()) else {
                warn!(
                    booking_id = %booking.id,
                    kind = %kind,
                    "Booking reminder: no phone number for recipient, skipping"
                );
                summary.skipped += 1;
                continue;
            };

            if let Err(e) = notification_service.send(&recipient, &body).await {
                warn!(
                    booking_id = %booking.id,
                    kind = %kind,
                    error = %e,
                    "Booking reminder: send failed, will retry on next run"
                );
                summary.failures += 1;
                continue;
            }

            if !BookingNotification::record(pool, booking.id, kind, &recipient, now).await? {
                debug!(
                    booking_id = %booking.id,
                    kind = %kind,
                    "Booking reminder: notification already recorded by a concurrent run"
                );
            }

            match kind {
                NotificationKind::Reminder => {
                    Booking::mark_reminder_sent(pool, booking.id, now).await?;
                    summary.reminders_sent += 1;
                }
                NotificationKind::Escalation => {
                    Booking::mark_escalated(pool, booking.id, now).await?;
                    summary.escalations_sent += 1;
                }
            }

            info!(
                booking_id = %booking.id,
                kind = %kind,
                channel = notification_service.channel(),
                "Booking reminder: notification sent"
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use db::{
        models::cleaner::CleanerStatus,
        test_utils::{CleanerFixture, OwnerFixture, create_booking, create_cleaner, create_owner},
    };

    use super::*;
    use crate::services::notification::testing::RecordingSender;

    const CLEANER_PHONE: &str = "+34611111111";
    const ADMIN_PHONE: &str = "+34699999999";

    struct Harness {
        db: DBService,
        sender: Arc<RecordingSender>,
        notifications: NotificationService,
        owner: OwnerFixture,
        cleaner: CleanerFixture,
    }

    async fn harness() -> Harness {
        let db = DBService::new_in_memory().await.unwrap();
        PlatformSettings::save(&db.pool, 120, 360, Some(ADMIN_PHONE), 15)
            .await
            .unwrap();
        let sender = Arc::new(RecordingSender::default());
        let notifications = NotificationService::new(sender.clone());
        let owner = create_owner(&db.pool, "Olivia").await;
        let cleaner = create_cleaner(&db.pool, "Carmen", Some(CLEANER_PHONE), CleanerStatus::Active).await;
        Harness {
            db,
            sender,
            notifications,
            owner,
            cleaner,
        }
    }

    #[test]
    fn test_classify_windows() {
        let t = ReminderThresholds::default();
        let now = Utc::now();
        assert_eq!(classify(now - Duration::minutes(119), now, t), ReminderWindow::TooYoung);
        assert_eq!(classify(now - Duration::minutes(120), now, t), ReminderWindow::Reminder);
        assert_eq!(classify(now - Duration::minutes(359), now, t), ReminderWindow::Reminder);
        assert_eq!(classify(now - Duration::minutes(360), now, t), ReminderWindow::Escalation);
        assert_eq!(classify(now - Duration::days(3), now, t), ReminderWindow::Escalation);
    }

    #[tokio::test]
    async fn test_young_bookings_are_left_alone() {
        let h = harness().await;
        let now = Utc::now();
        create_booking(&h.db.pool, &h.owner, &h.cleaner, now - Duration::minutes(30)).await;

        let summary = BookingReminderService::run_once(&h.db.pool, &h.notifications, now)
            .await
            .unwrap();

        assert_eq!(summary, ReminderRunSummary::default());
        assert!(h.sender.messages().is_empty());
    }

    #[tokio::test]
    async fn test_reminder_sent_once_to_cleaner() {
        let h = harness().await;
        let now = Utc::now();
        let booking = create_booking(&h.db.pool, &h.owner, &h.cleaner, now - Duration::hours(3)).await;

        let first = BookingReminderService::run_once(&h.db.pool, &h.notifications, now)
            .await
            .unwrap();
        assert_eq!(first.reminders_sent, 1);
        assert_eq!(first.escalations_sent, 0);

        let messages = h.sender.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, CLEANER_PHONE);
        assert!(messages[0].1.contains("Villa Olivia"));

        let second = BookingReminderService::run_once(&h.db.pool, &h.notifications, now + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(second.reminders_sent, 0);
        assert_eq!(second.already_notified, 1);
        assert_eq!(h.sender.messages().len(), 1);

        let reloaded = Booking::find_by_id(&h.db.pool, booking.id).await.unwrap().unwrap();
        assert!(reloaded.reminder_sent_at.is_some());
        assert!(reloaded.escalated_at.is_none());
    }

    #[tokio::test]
    async fn test_escalation_after_reminder_goes_to_admin() {
        let h = harness().await;
        let created = Utc::now() - Duration::hours(3);
        let booking = create_booking(&h.db.pool, &h.owner, &h.cleaner, created).await;

        BookingReminderService::run_once(&h.db.pool, &h.notifications, created + Duration::hours(3))
            .await
            .unwrap();
        let summary = BookingReminderService::run_once(&h.db.pool, &h.notifications, created + Duration::hours(7))
            .await
            .unwrap();

        assert_eq!(summary.escalations_sent, 1);
        let messages = h.sender.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].0, ADMIN_PHONE);
        assert!(messages[1].1.contains(&booking.id.to_string()));

        let kinds: Vec<NotificationKind> = BookingNotification::find_by_booking_id(&h.db.pool, booking.id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.kind)
            .collect();
        assert_eq!(kinds, vec![NotificationKind::Reminder, NotificationKind::Escalation]);
    }

    #[tokio::test]
    async fn test_old_booking_escalates_without_prior_reminder() {
        let h = harness().await;
        let now = Utc::now();
        create_booking(&h.db.pool, &h.owner, &h.cleaner, now - Duration::hours(10)).await;

        let summary = BookingReminderService::run_once(&h.db.pool, &h.notifications, now)
            .await
            .unwrap();

        assert_eq!(summary.reminders_sent, 0);
        assert_eq!(summary.escalations_sent, 1);
        assert_eq!(h.sender.messages()[0].0, ADMIN_PHONE);
    }

    #[tokio::test]
    async fn test_non_pending_bookings_are_never_notified() {
        let h = harness().await;
        let now = Utc::now();
        let booking = create_booking(&h.db.pool, &h.owner, &h.cleaner, now - Duration::hours(10)).await;
        Booking::transition_status(
            &h.db.pool,
            booking.id,
            db::models::booking::BookingStatus::Pending,
            db::models::booking::BookingStatus::Confirmed,
        )
        .await
        .unwrap();

        let summary = BookingReminderService::run_once(&h.db.pool, &h.notifications, now)
            .await
            .unwrap();

        assert_eq!(summary.checked, 0);
        assert!(h.sender.messages().is_empty());
    }

    #[tokio::test]
    async fn test_failed_send_is_retried_next_run() {
        let h = harness().await;
        let now = Utc::now();
        create_booking(&h.db.pool, &h.owner, &h.cleaner, now - Duration::hours(3)).await;
        h.sender.fail_for(CLEANER_PHONE);

        let failed = BookingReminderService::run_once(&h.db.pool, &h.notifications, now)
            .await
            .unwrap();
        assert_eq!(failed.failures, 1);
        assert_eq!(failed.reminders_sent, 0);

        h.sender.recover();
        let retried = BookingReminderService::run_once(&h.db.pool, &h.notifications, now + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(retried.reminders_sent, 1);
        assert_eq!(h.sender.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_phone_is_skipped() {
        let h = harness().await;
        let silent = create_cleaner(&h.db.pool, "Sin Telefono", None, CleanerStatus::Active).await;
        let now = Utc::now();
        create_booking(&h.db.pool, &h.owner, &silent, now - Duration::hours(3)).await;

        let summary = BookingReminderService::run_once(&h.db.pool, &h.notifications, now)
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert!(h.sender.messages().is_empty());
    }
}
