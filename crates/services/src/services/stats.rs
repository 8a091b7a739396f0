//! Dashboard statistics: date ranges and aggregations over booking rows.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use db::models::{
    booking::{Booking, BookingStatus},
    cleaner::{Cleaner, CleanerStatus},
    platform_settings::PlatformSettings,
    review::{RatingSummary, Review},
    user::User,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use ts_rs::TS;
use uuid::Uuid;

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 { (year + 1, 1) } else { (year, month + 1) }
}

fn previous_month_of(year: i32, month: u32) -> (i32, u32) {
    if month == 1 { (year - 1, 12) } else { (year, month - 1) }
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// Calendar month containing `now`.
    pub fn current_month(now: DateTime<Utc>) -> Self {
        let (ny, nm) = next_month(now.year(), now.month());
        Self {
            start: month_start(now.year(), now.month()),
            end: month_start(ny, nm),
        }
    }

    /// Calendar month before the one containing `now`.
    pub fn previous_month(now: DateTime<Utc>) -> Self {
        let (py, pm) = previous_month_of(now.year(), now.month());
        Self {
            start: month_start(py, pm),
            end: month_start(now.year(), now.month()),
        }
    }

    /// The `days` days up to and including `now`.
    pub fn last_days(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: now - Duration::days(days),
            end: now + Duration::seconds(1),
        }
    }
}

/// Percentage change from `previous` to `current`, rounded to one decimal.
/// `None` when there is no baseline.
pub fn percent_change(current: i64, previous: i64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    let change = (current - previous) as f64 / previous as f64 * 100.0;
    Some((change * 10.0).round() / 10.0)
}

/// Cleaner's share of a booking price after the platform fee.
pub fn net_of_fee(price_cents: i64, fee_percent: i64) -> i64 {
    price_cents - price_cents * fee_percent / 100
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct OwnerStats {
    pub upcoming_bookings: i64,
    pub completed_this_month: i64,
    pub spent_this_month_cents: i64,
    pub spent_total_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct CleanerStats {
    pub pending_requests: i64,
    pub upcoming_confirmed: i64,
    pub completed_this_month: i64,
    pub earnings_this_month_cents: i64,
    pub earnings_last_month_cents: i64,
    pub earnings_change_percent: Option<f64>,
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct StatusCounts {
    pub pending: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct AdminStats {
    pub range: DateRange,
    pub bookings: StatusCounts,
    pub gross_revenue_cents: i64,
    pub platform_fee_cents: i64,
    pub pending_cleaner_applications: i64,
    pub new_users: i64,
}

/// When a completed booking counts for revenue: its completion time, falling
/// back to the scheduled time for imported rows.
fn completion_time(booking: &Booking) -> DateTime<Utc> {
    booking.completed_at.unwrap_or(booking.scheduled_for)
}

pub fn owner_stats(bookings: &[Booking], now: DateTime<Utc>) -> OwnerStats {
    let month = DateRange::current_month(now);
    let mut stats = OwnerStats::default();

    for booking in bookings {
        match booking.status {
            BookingStatus::Pending | BookingStatus::Confirmed if booking.scheduled_for >= now => {
                stats.upcoming_bookings += 1;
            }
            BookingStatus::Completed => {
                stats.spent_total_cents += booking.price_cents;
                if month.contains(completion_time(booking)) {
                    stats.completed_this_month += 1;
                    stats.spent_this_month_cents += booking.price_cents;
                }
            }
            _ => {}
        }
    }

    stats
}

pub fn cleaner_stats(
    bookings: &[Booking],
    rating: &RatingSummary,
    fee_percent: i64,
    now: DateTime<Utc>,
) -> CleanerStats {
    let this_month = DateRange::current_month(now);
    let last_month = DateRange::previous_month(now);
    let mut stats = CleanerStats {
        average_rating: rating.average.map(|avg| (avg * 10.0).round() / 10.0),
        review_count: rating.count,
        ..Default::default()
    };

    for booking in bookings {
        match booking.status {
            BookingStatus::Pending => stats.pending_requests += 1,
            BookingStatus::Confirmed if booking.scheduled_for >= now => {
                stats.upcoming_confirmed += 1;
            }
            BookingStatus::Completed => {
                let at = completion_time(booking);
                let net = net_of_fee(booking.price_cents, fee_percent);
                if this_month.contains(at) {
                    stats.completed_this_month += 1;
                    stats.earnings_this_month_cents += net;
                } else if last_month.contains(at) {
                    stats.earnings_last_month_cents += net;
                }
            }
            _ => {}
        }
    }

    stats.earnings_change_percent =
        percent_change(stats.earnings_this_month_cents, stats.earnings_last_month_cents);
    stats
}

/// Admin figures for bookings created inside `range`.
pub fn booking_totals(bookings: &[Booking], range: DateRange, fee_percent: i64) -> (StatusCounts, i64, i64) {
    let mut counts = StatusCounts::default();
    let mut gross = 0;

    for booking in bookings.iter().filter(|b| range.contains(b.created_at)) {
        match booking.status {
            BookingStatus::Pending => counts.pending += 1,
            BookingStatus::Confirmed => counts.confirmed += 1,
            BookingStatus::Completed => {
                counts.completed += 1;
                gross += booking.price_cents;
            }
            BookingStatus::Cancelled => counts.cancelled += 1,
        }
    }

    let fee = gross - net_of_fee(gross, fee_percent);
    (counts, gross, fee)
}

pub async fn load_owner_stats(
    pool: &SqlitePool,
    owner_id: Uuid,
    now: DateTime<Utc>,
) -> Result<OwnerStats, sqlx::Error> {
    let bookings = Booking::find_by_owner_id(pool, owner_id).await?;
    Ok(owner_stats(&bookings, now))
}

pub async fn load_cleaner_stats(
    pool: &SqlitePool,
    cleaner_id: Uuid,
    now: DateTime<Utc>,
) -> Result<CleanerStats, sqlx::Error> {
    let bookings = Booking::find_by_cleaner_id(pool, cleaner_id).await?;
    let rating = Review::rating_summary(pool, cleaner_id).await?;
    let settings = PlatformSettings::get(pool).await?;
    Ok(cleaner_stats(
        &bookings,
        &rating,
        settings.platform_fee_percent,
        now,
    ))
}

pub async fn load_admin_stats(pool: &SqlitePool, range: DateRange) -> Result<AdminStats, sqlx::Error> {
    let bookings = Booking::find_created_between(pool, range.start, range.end).await?;
    let settings = PlatformSettings::get(pool).await?;
    let (counts, gross, fee) = booking_totals(&bookings, range, settings.platform_fee_percent);

    Ok(AdminStats {
        range,
        bookings: counts,
        gross_revenue_cents: gross,
        platform_fee_cents: fee,
        pending_cleaner_applications: Cleaner::count_by_status(pool, CleanerStatus::Pending).await?,
        new_users: User::count_created_between(pool, range.start, range.end).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn booking(status: BookingStatus, price_cents: i64, scheduled_for: DateTime<Utc>, completed_at: Option<DateTime<Utc>>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            cleaner_id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            service_type: "regular_clean".to_string(),
            scheduled_for,
            hours: 3.0,
            price_cents,
            status,
            notes: None,
            reminder_sent_at: None,
            escalated_at: None,
            confirmed_at: None,
            completed_at,
            cancelled_at: None,
            created_at: scheduled_for - Duration::days(2),
            updated_at: scheduled_for,
        }
    }

    #[test]
    fn test_month_ranges_are_half_open_and_wrap_years() {
        let now = at(2026, 1, 15, 12);
        let current = DateRange::current_month(now);
        assert_eq!(current.start, at(2026, 1, 1, 0));
        assert_eq!(current.end, at(2026, 2, 1, 0));
        assert!(current.contains(at(2026, 1, 1, 0)));
        assert!(!current.contains(at(2026, 2, 1, 0)));

        let previous = DateRange::previous_month(now);
        assert_eq!(previous.start, at(2025, 12, 1, 0));
        assert_eq!(previous.end, at(2026, 1, 1, 0));

        let december = DateRange::current_month(at(2025, 12, 31, 23));
        assert_eq!(december.end, at(2026, 1, 1, 0));
    }

    #[test]
    fn test_date_range_rejects_empty() {
        let t = at(2026, 3, 1, 0);
        assert!(DateRange::new(t, t).is_none());
        assert!(DateRange::new(t, t + Duration::hours(1)).is_some());
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(150, 100), Some(50.0));
        assert_eq!(percent_change(50, 100), Some(-50.0));
        assert_eq!(percent_change(1, 3), Some(-66.7));
        assert_eq!(percent_change(10, 0), None);
    }

    #[test]
    fn test_owner_stats() {
        let now = at(2026, 3, 15, 12);
        let bookings = vec![
            booking(BookingStatus::Pending, 6000, at(2026, 3, 20, 10), None),
            booking(BookingStatus::Confirmed, 6000, at(2026, 3, 18, 10), None),
            booking(BookingStatus::Completed, 5000, at(2026, 3, 2, 10), Some(at(2026, 3, 2, 14))),
            booking(BookingStatus::Completed, 7000, at(2026, 2, 10, 10), Some(at(2026, 2, 10, 14))),
            booking(BookingStatus::Cancelled, 9000, at(2026, 3, 25, 10), None),
        ];

        let stats = owner_stats(&bookings, now);
        assert_eq!(stats.upcoming_bookings, 2);
        assert_eq!(stats.completed_this_month, 1);
        assert_eq!(stats.spent_this_month_cents, 5000);
        assert_eq!(stats.spent_total_cents, 12000);
    }

    #[test]
    fn test_cleaner_stats_month_over_month() {
        let now = at(2026, 3, 15, 12);
        let bookings = vec![
            booking(BookingStatus::Pending, 6000, at(2026, 3, 20, 10), None),
            booking(BookingStatus::Completed, 10000, at(2026, 3, 2, 10), Some(at(2026, 3, 2, 14))),
            booking(BookingStatus::Completed, 10000, at(2026, 3, 5, 10), Some(at(2026, 3, 5, 14))),
            booking(BookingStatus::Completed, 10000, at(2026, 2, 10, 10), Some(at(2026, 2, 10, 14))),
        ];
        let rating = RatingSummary { average: Some(4.666), count: 3 };

        let stats = cleaner_stats(&bookings, &rating, 15, now);
        assert_eq!(stats.pending_requests, 1);
        assert_eq!(stats.completed_this_month, 2);
        assert_eq!(stats.earnings_this_month_cents, 17000);
        assert_eq!(stats.earnings_last_month_cents, 8500);
        assert_eq!(stats.earnings_change_percent, Some(100.0));
        assert_eq!(stats.average_rating, Some(4.7));
        assert_eq!(stats.review_count, 3);
    }

    #[test]
    fn test_booking_totals_only_counts_range() {
        let range = DateRange::new(at(2026, 3, 1, 0), at(2026, 4, 1, 0)).unwrap();
        let bookings = vec![
            booking(BookingStatus::Completed, 10000, at(2026, 3, 10, 10), Some(at(2026, 3, 10, 14))),
            booking(BookingStatus::Cancelled, 5000, at(2026, 3, 12, 10), None),
            booking(BookingStatus::Pending, 5000, at(2026, 3, 20, 10), None),
            booking(BookingStatus::Completed, 10000, at(2026, 5, 10, 10), Some(at(2026, 5, 10, 14))),
        ];

        let (counts, gross, fee) = booking_totals(&bookings, range, 15);
        assert_eq!(counts, StatusCounts { pending: 1, confirmed: 0, completed: 1, cancelled: 1 });
        assert_eq!(gross, 10000);
        assert_eq!(fee, 1500);
    }
}
