//! Fixture builders shared by the test suites of every crate.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use utils::text::{generate_token, hash_token};
use uuid::Uuid;

use crate::models::{
    booking::{Booking, CreateBooking},
    cleaner::{Cleaner, CleanerStatus, CreateCleaner},
    owner::Owner,
    property::{CreateProperty, Property},
    session::Session,
    user::{CreateUser, User, UserRole},
};

pub struct OwnerFixture {
    pub user: User,
    pub owner: Owner,
    pub property: Property,
}

pub struct CleanerFixture {
    pub user: User,
    pub cleaner: Cleaner,
}

pub async fn create_user(pool: &SqlitePool, name: &str, phone: Option<&str>, role: UserRole) -> User {
    let email = format!("{}-{}@example.com", name.to_lowercase().replace(' ', "."), Uuid::new_v4());
    User::create(
        pool,
        &CreateUser {
            email,
            name: name.to_string(),
            phone: phone.map(str::to_string),
            role,
        },
    )
    .await
    .expect("create user")
}

pub async fn create_owner(pool: &SqlitePool, name: &str) -> OwnerFixture {
    let user = create_user(pool, name, Some("+34600000001"), UserRole::Owner).await;
    let owner = Owner::create(pool, user.id, "en").await.expect("create owner");
    let property = Property::create(
        pool,
        owner.id,
        &CreateProperty {
            name: format!("Villa {name}"),
            address: "Calle del Mar 1, Alicante".to_string(),
            bedrooms: Some(3),
            bathrooms: Some(2),
            notes: None,
        },
    )
    .await
    .expect("create property");
    OwnerFixture { user, owner, property }
}

pub async fn create_cleaner(
    pool: &SqlitePool,
    name: &str,
    phone: Option<&str>,
    status: CleanerStatus,
) -> CleanerFixture {
    let user = create_user(pool, name, phone, UserRole::Cleaner).await;
    let slug = format!("{}-{}", utils::text::slugify(name), &Uuid::new_v4().simple().to_string()[..6]);
    let cleaner = Cleaner::create(
        pool,
        &CreateCleaner {
            user_id: user.id,
            bio: None,
            hourly_rate_cents: Some(2000),
            service_areas: vec!["Alicante".to_string()],
        },
        &slug,
    )
    .await
    .expect("create cleaner");
    let cleaner = Cleaner::update_status(pool, cleaner.id, status)
        .await
        .expect("update cleaner status")
        .expect("cleaner exists");
    CleanerFixture { user, cleaner }
}

pub async fn create_admin(pool: &SqlitePool, name: &str) -> User {
    create_user(pool, name, Some("+34600999999"), UserRole::Admin).await
}

/// PENDING booking whose `created_at` is backdated to `created_at`.
pub async fn create_booking(
    pool: &SqlitePool,
    owner: &OwnerFixture,
    cleaner: &CleanerFixture,
    created_at: DateTime<Utc>,
) -> Booking {
    let booking = Booking::create(
        pool,
        &CreateBooking {
            owner_id: owner.owner.id,
            cleaner_id: cleaner.cleaner.id,
            property_id: owner.property.id,
            service_type: "regular_clean".to_string(),
            scheduled_for: created_at + Duration::days(3),
            hours: 3.0,
            price_cents: 6000,
            notes: None,
        },
    )
    .await
    .expect("create booking");
    Booking::set_created_at(pool, booking.id, created_at)
        .await
        .expect("backdate booking");
    Booking::find_by_id(pool, booking.id)
        .await
        .expect("reload booking")
        .expect("booking exists")
}

/// Issue a session and return the raw cookie token.
pub async fn login(pool: &SqlitePool, user_id: Uuid) -> String {
    let token = generate_token();
    Session::create(pool, user_id, &hash_token(&token), Duration::hours(1))
        .await
        .expect("create session");
    token
}
