//! Cleaner self sign-up with phone verification.
//!
//! `start` stores a pending sign-up and sends a six digit code over the
//! messaging channel. `verify` checks the code and, in one transaction,
//! creates the user, the cleaner profile (PENDING, with a fresh slug) and a
//! session, then drops the pending row.

use chrono::{DateTime, Duration, Utc};
use db::{
    models::{
        cleaner::{Cleaner, CreateCleaner},
        pending_onboarding::PendingOnboarding,
        session::Session,
        user::{CreateUser, User, UserRole},
    },
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::text::{generate_code, generate_token, hash_token};
use uuid::Uuid;

use super::{
    notification::{MessagingError, NotificationService, normalize_phone},
    rate_limiter::{RateLimitDecision, RateLimiter},
    slug::{SlugError, create_cleaner_with_slug},
};

pub const CODE_TTL_MINUTES: i64 = 15;
pub const MAX_VERIFY_ATTEMPTS: i64 = 5;
pub const STARTS_PER_PHONE_PER_HOUR: u32 = 3;

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("could not deliver verification code: {0}")]
    Delivery(#[from] MessagingError),
    #[error("{0}")]
    Validation(String),
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("too many verification requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("onboarding request not found")]
    NotFound,
    #[error("verification code expired")]
    Expired,
    #[error("invalid verification code")]
    InvalidCode,
    #[error("too many failed attempts, request a new code")]
    TooManyAttempts,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct StartOnboarding {
    pub email: String,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct OnboardingStarted {
    pub onboarding_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct VerifyOnboarding {
    pub onboarding_id: Uuid,
    pub code: String,
    pub bio: Option<String>,
    pub hourly_rate_cents: Option<i64>,
    #[ts(optional)]
    pub service_areas: Option<Vec<String>>,
}

impl VerifyOnboarding {
    /// Profile fields checked before any code attempt is spent.
    fn validate(&self) -> Result<(), OnboardingError> {
        if self.hourly_rate_cents.is_some_and(|rate| rate < 0) {
            return Err(OnboardingError::Validation("hourly_rate_cents cannot be negative".to_string()));
        }
        if self
            .service_areas
            .iter()
            .flatten()
            .any(|area| area.trim().is_empty())
        {
            return Err(OnboardingError::Validation("service areas cannot be blank".to_string()));
        }
        Ok(())
    }
}

/// Result of a successful verification. `session_token` is the raw cookie
/// value and is never stored.
#[derive(Debug, Clone)]
pub struct OnboardingCompleted {
    pub user: User,
    pub cleaner: Cleaner,
    pub session_token: String,
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[derive(Clone)]
pub struct OnboardingService {
    pool: SqlitePool,
    notifications: NotificationService,
    limiter: RateLimiter,
}

impl OnboardingService {
    pub fn new(pool: SqlitePool, notifications: NotificationService) -> Self {
        Self {
            pool,
            notifications,
            limiter: RateLimiter::new(STARTS_PER_PHONE_PER_HOUR, Duration::hours(1)),
        }
    }

    pub async fn start(
        &self,
        req: &StartOnboarding,
        now: DateTime<Utc>,
    ) -> Result<OnboardingStarted, OnboardingError> {
        let email = req.email.trim().to_lowercase();
        let name = req.name.trim();
        if !is_plausible_email(&email) {
            return Err(OnboardingError::Validation("invalid email address".to_string()));
        }
        if name.is_empty() {
            return Err(OnboardingError::Validation("name is required".to_string()));
        }
        let phone = normalize_phone(&req.phone)
            .ok_or_else(|| OnboardingError::Validation("invalid phone number".to_string()))?;

        if User::find_by_email(&self.pool, &email).await?.is_some() {
            return Err(OnboardingError::EmailTaken);
        }

        let key = format!("onboarding:{phone}");
        if let RateLimitDecision::Limited { retry_after_secs } =
            self.limiter.hit(&self.pool, &key, now).await?
        {
            warn!(phone = %phone, "Onboarding start rate limited");
            return Err(OnboardingError::RateLimited { retry_after_secs });
        }

        let code = generate_code();
        let expires_at = now + Duration::minutes(CODE_TTL_MINUTES);
        let pending =
            PendingOnboarding::create(&self.pool, &email, name, &phone, &hash_token(&code), expires_at)
                .await?;

        let body = format!(
            "Your VillaCare verification code is {code}. It expires in {CODE_TTL_MINUTES} minutes."
        );
        if let Err(e) = self.notifications.send(&phone, &body).await {
            PendingOnboarding::delete(&self.pool, pending.id).await?;
            return Err(e.into());
        }

        info!(onboarding_id = %pending.id, "Onboarding code sent");
        Ok(OnboardingStarted {
            onboarding_id: pending.id,
            expires_at,
        })
    }

    pub async fn verify(
        &self,
        req: &VerifyOnboarding,
        session_ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<OnboardingCompleted, OnboardingError> {
        req.validate()?;
        let pending = PendingOnboarding::find_by_id(&self.pool, req.onboarding_id)
            .await?
            .ok_or(OnboardingError::NotFound)?;

        if pending.is_expired(now) {
            return Err(OnboardingError::Expired);
        }
        if pending.attempts >= MAX_VERIFY_ATTEMPTS {
            return Err(OnboardingError::TooManyAttempts);
        }
        if hash_token(req.code.trim()) != pending.code_hash {
            PendingOnboarding::increment_attempts(&self.pool, pending.id).await?;
            warn!(onboarding_id = %pending.id, attempts = pending.attempts + 1, "Wrong onboarding code");
            return Err(OnboardingError::InvalidCode);
        }

        if User::find_by_email(&self.pool, &pending.email).await?.is_some() {
            return Err(OnboardingError::EmailTaken);
        }

        let mut tx = self.pool.begin().await?;

        let user = User::create(
            &mut *tx,
            &CreateUser {
                email: pending.email.clone(),
                name: pending.name.clone(),
                phone: Some(pending.phone.clone()),
                role: UserRole::Cleaner,
            },
        )
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                OnboardingError::EmailTaken
            } else {
                e.into()
            }
        })?;

        let cleaner = create_cleaner_with_slug(
            &mut tx,
            &CreateCleaner {
                user_id: user.id,
                bio: req.bio.clone(),
                hourly_rate_cents: req.hourly_rate_cents,
                service_areas: req
                    .service_areas
                    .iter()
                    .flatten()
                    .map(|area| area.trim().to_string())
                    .collect(),
            },
            &pending.name,
        )
        .await?;

        let session_token = generate_token();
        Session::create(&mut *tx, user.id, &hash_token(&session_token), session_ttl).await?;
        PendingOnboarding::delete(&mut *tx, pending.id).await?;

        tx.commit().await?;

        info!(user_id = %user.id, cleaner_id = %cleaner.id, slug = %cleaner.slug, "Cleaner onboarded");
        Ok(OnboardingCompleted {
            user,
            cleaner,
            session_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use db::{
        DBService,
        models::cleaner::CleanerStatus,
        test_utils::create_user,
    };

    use super::*;
    use crate::services::notification::testing::RecordingSender;

    const PHONE: &str = "+34 611 22 33 44";
    const NORMALIZED: &str = "+34611223344";

    async fn setup() -> (DBService, Arc<RecordingSender>, OnboardingService) {
        let db = DBService::new_in_memory().await.unwrap();
        let sender = Arc::new(RecordingSender::default());
        let service = OnboardingService::new(db.pool.clone(), NotificationService::new(sender.clone()));
        (db, sender, service)
    }

    fn start_req(email: &str) -> StartOnboarding {
        StartOnboarding {
            email: email.to_string(),
            name: "María López".to_string(),
            phone: PHONE.to_string(),
        }
    }

    fn verify_req(onboarding_id: Uuid, code: &str) -> VerifyOnboarding {
        VerifyOnboarding {
            onboarding_id,
            code: code.to_string(),
            bio: None,
            hourly_rate_cents: Some(2200),
            service_areas: Some(vec!["Jávea".to_string()]),
        }
    }

    fn sent_code(sender: &RecordingSender) -> String {
        let (_, body) = sender.messages().pop().expect("code message sent");
        body.split(|c: char| !c.is_ascii_digit())
            .find(|part| part.len() == 6)
            .expect("six digit code")
            .to_string()
    }

    #[tokio::test]
    async fn test_start_then_verify_creates_pending_cleaner_and_session() {
        let (db, sender, service) = setup().await;
        let now = Utc::now();

        let started = service.start(&start_req("Maria@Example.com"), now).await.unwrap();
        assert_eq!(sender.messages()[0].0, NORMALIZED);
        let code = sent_code(&sender);

        let done = service
            .verify(&verify_req(started.onboarding_id, &code), Duration::hours(1), now)
            .await
            .unwrap();

        assert_eq!(done.user.email, "maria@example.com");
        assert_eq!(done.user.role, UserRole::Cleaner);
        assert_eq!(done.cleaner.status, CleanerStatus::Pending);
        assert_eq!(done.cleaner.slug, "maria-lopez");
        assert_eq!(done.cleaner.hourly_rate_cents, 2200);

        let session_user = Session::find_user_by_token_hash(&db.pool, &hash_token(&done.session_token), Utc::now())
            .await
            .unwrap()
            .expect("session resolves");
        assert_eq!(session_user.id, done.user.id);
        assert!(PendingOnboarding::find_by_id(&db.pool, started.onboarding_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_rate_rejected_without_spending_attempt() {
        let (db, sender, service) = setup().await;
        let now = Utc::now();
        let started = service.start(&start_req("ana@example.com"), now).await.unwrap();
        let code = sent_code(&sender);

        let mut req = verify_req(started.onboarding_id, &code);
        req.hourly_rate_cents = Some(-500);
        let err = service.verify(&req, Duration::hours(1), now).await.unwrap_err();
        assert!(matches!(err, OnboardingError::Validation(_)));

        req.hourly_rate_cents = Some(2000);
        req.service_areas = Some(vec!["  ".to_string()]);
        let err = service.verify(&req, Duration::hours(1), now).await.unwrap_err();
        assert!(matches!(err, OnboardingError::Validation(_)));

        let pending = PendingOnboarding::find_by_id(&db.pool, started.onboarding_id)
            .await
            .unwrap()
            .expect("pending row kept");
        assert_eq!(pending.attempts, 0);
    }

    #[tokio::test]
    async fn test_non_latin_name_gets_fallback_slug() {
        let (_db, sender, service) = setup().await;
        let now = Utc::now();

        let mut slugs = Vec::new();
        for (email, name) in [("lina@example.com", "李娜"), ("anna@example.com", "Анна")] {
            let req = StartOnboarding {
                email: email.to_string(),
                name: name.to_string(),
                phone: format!("+3461100000{}", slugs.len()),
            };
            let started = service.start(&req, now).await.unwrap();
            let code = sent_code(&sender);
            let done = service
                .verify(&verify_req(started.onboarding_id, &code), Duration::hours(1), now)
                .await
                .unwrap();
            slugs.push(done.cleaner.slug);
        }

        assert_eq!(slugs, vec!["cleaner", "cleaner-2"]);
    }

    #[tokio::test]
    async fn test_wrong_codes_lock_after_max_attempts() {
        let (_db, sender, service) = setup().await;
        let now = Utc::now();
        let started = service.start(&start_req("ana@example.com"), now).await.unwrap();
        let code = sent_code(&sender);
        let wrong = if code == "000000" { "111111" } else { "000000" };

        for _ in 0..MAX_VERIFY_ATTEMPTS {
            let err = service
                .verify(&verify_req(started.onboarding_id, wrong), Duration::hours(1), now)
                .await
                .unwrap_err();
            assert!(matches!(err, OnboardingError::InvalidCode));
        }

        let err = service
            .verify(&verify_req(started.onboarding_id, &code), Duration::hours(1), now)
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::TooManyAttempts));
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let (_db, sender, service) = setup().await;
        let now = Utc::now();
        let started = service.start(&start_req("ana@example.com"), now).await.unwrap();
        let code = sent_code(&sender);

        let err = service
            .verify(
                &verify_req(started.onboarding_id, &code),
                Duration::hours(1),
                now + Duration::minutes(CODE_TTL_MINUTES + 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::Expired));
    }

    #[tokio::test]
    async fn test_registered_email_rejected() {
        let (db, _sender, service) = setup().await;
        let existing = create_user(&db.pool, "Olivia", None, UserRole::Owner).await;

        let err = service.start(&start_req(&existing.email), Utc::now()).await.unwrap_err();
        assert!(matches!(err, OnboardingError::EmailTaken));
    }

    #[tokio::test]
    async fn test_fourth_start_per_phone_is_rate_limited() {
        let (_db, sender, service) = setup().await;
        let now = Utc::now();

        for i in 0..STARTS_PER_PHONE_PER_HOUR {
            service
                .start(&start_req(&format!("user{i}@example.com")), now)
                .await
                .unwrap();
        }
        let err = service.start(&start_req("late@example.com"), now).await.unwrap_err();
        assert!(matches!(err, OnboardingError::RateLimited { .. }));
        assert_eq!(sender.messages().len(), STARTS_PER_PHONE_PER_HOUR as usize);
    }

    #[tokio::test]
    async fn test_failed_delivery_drops_pending_row() {
        let (db, sender, service) = setup().await;
        sender.fail_for(NORMALIZED);

        let err = service.start(&start_req("ana@example.com"), Utc::now()).await.unwrap_err();
        assert!(matches!(err, OnboardingError::Delivery(_)));
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_onboardings")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_email_shape() {
        assert!(is_plausible_email("a@b.es"));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("@b.es"));
        assert!(!is_plausible_email("ab.es"));
    }
}
