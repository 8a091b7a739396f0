//! Booking lifecycle: creation by owners, answers from cleaners, cancellation
//! and reviews.

use chrono::{DateTime, Utc};
use db::{
    is_unique_violation,
    models::{
        booking::{Booking, BookingStatus, CreateBooking},
        cleaner::{Cleaner, CleanerStatus},
        property::Property,
        review::{CreateReview, Review},
    },
};
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

const MAX_HOURS: f64 = 12.0;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("booking not found")]
    NotFound,
    #[error("not allowed to act on this booking")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("booking already reviewed")]
    AlreadyReviewed,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct NewBookingRequest {
    pub cleaner_id: Uuid,
    pub property_id: Uuid,
    pub service_type: String,
    pub scheduled_for: DateTime<Utc>,
    pub hours: f64,
    pub notes: Option<String>,
}

/// Who is moving the booking. Determines which transitions are open to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingActor {
    Cleaner(Uuid),
    Owner(Uuid),
    Admin,
}

/// What the actor wants to do with the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Accept,
    Decline,
    Complete,
    Cancel,
}

impl BookingAction {
    fn target(self) -> BookingStatus {
        match self {
            BookingAction::Accept => BookingStatus::Confirmed,
            BookingAction::Complete => BookingStatus::Completed,
            BookingAction::Decline | BookingAction::Cancel => BookingStatus::Cancelled,
        }
    }
}

pub fn price_cents(hours: f64, hourly_rate_cents: i64) -> i64 {
    (hours * hourly_rate_cents as f64).round() as i64
}

fn check_actor(booking: &Booking, actor: BookingActor, action: BookingAction) -> Result<(), BookingError> {
    let allowed = match (actor, action) {
        (BookingActor::Cleaner(id), BookingAction::Accept | BookingAction::Decline | BookingAction::Complete) => {
            booking.cleaner_id == id
        }
        (BookingActor::Owner(id), BookingAction::Cancel) => booking.owner_id == id,
        (BookingActor::Admin, BookingAction::Cancel) => true,
        _ => false,
    };
    if allowed { Ok(()) } else { Err(BookingError::Forbidden) }
}

pub async fn create_booking(
    pool: &SqlitePool,
    owner_id: Uuid,
    req: &NewBookingRequest,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    if !(req.hours > 0.0 && req.hours <= MAX_HOURS) {
        return Err(BookingError::Validation(format!(
            "hours must be between 0 and {MAX_HOURS}"
        )));
    }
    if req.scheduled_for <= now {
        return Err(BookingError::Validation("scheduled_for must be in the future".to_string()));
    }
    if req.service_type.trim().is_empty() {
        return Err(BookingError::Validation("service_type is required".to_string()));
    }

    let property = Property::find_by_id(pool, req.property_id)
        .await?
        .filter(|p| p.owner_id == owner_id)
        .ok_or_else(|| BookingError::Validation("unknown property".to_string()))?;

    let cleaner = Cleaner::find_by_id(pool, req.cleaner_id)
        .await?
        .filter(|c| c.status == CleanerStatus::Active)
        .ok_or_else(|| BookingError::Validation("cleaner is not available".to_string()))?;

    let booking = Booking::create(
        pool,
        &CreateBooking {
            owner_id,
            cleaner_id: cleaner.id,
            property_id: property.id,
            service_type: req.service_type.trim().to_string(),
            scheduled_for: req.scheduled_for,
            hours: req.hours,
            price_cents: price_cents(req.hours, cleaner.hourly_rate_cents),
            notes: req.notes.clone(),
        },
    )
    .await?;

    info!(booking_id = %booking.id, cleaner_id = %cleaner.id, price_cents = booking.price_cents, "Booking created");
    Ok(booking)
}

/// Apply `action` to the booking on behalf of `actor`. Illegal transitions,
/// including a declined CONFIRMED booking, are rejected.
pub async fn apply_action(
    pool: &SqlitePool,
    booking_id: Uuid,
    actor: BookingActor,
    action: BookingAction,
) -> Result<Booking, BookingError> {
    let booking = Booking::find_by_id(pool, booking_id)
        .await?
        .ok_or(BookingError::NotFound)?;
    check_actor(&booking, actor, action)?;

    let to = action.target();
    let legal = booking.status.can_transition_to(to)
        && !(action == BookingAction::Decline && booking.status != BookingStatus::Pending);
    if !legal {
        return Err(BookingError::InvalidTransition {
            from: booking.status,
            to,
        });
    }

    let updated = Booking::transition_status(pool, booking.id, booking.status, to)
        .await?
        .ok_or(BookingError::InvalidTransition {
            from: booking.status,
            to,
        })?;

    info!(booking_id = %updated.id, from = %booking.status, to = %to, ?actor, "Booking status changed");
    Ok(updated)
}

pub async fn review_booking(
    pool: &SqlitePool,
    owner_id: Uuid,
    booking_id: Uuid,
    data: &CreateReview,
) -> Result<Review, BookingError> {
    if !(1..=5).contains(&data.rating) {
        return Err(BookingError::Validation("rating must be between 1 and 5".to_string()));
    }

    let booking = Booking::find_by_id(pool, booking_id)
        .await?
        .ok_or(BookingError::NotFound)?;
    if booking.owner_id != owner_id {
        return Err(BookingError::Forbidden);
    }
    if booking.status != BookingStatus::Completed {
        return Err(BookingError::Validation("only completed bookings can be reviewed".to_string()));
    }

    Review::create(pool, booking.id, booking.cleaner_id, owner_id, data)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                BookingError::AlreadyReviewed
            } else {
                e.into()
            }
        })
}
