pub mod assistant;
pub mod booking_reminder;
pub mod bookings;
pub mod claude_api;
pub mod cleanup;
pub mod health;
pub mod notification;
pub mod onboarding;
pub mod rate_limiter;
pub mod settings;
pub mod slug;
pub mod stats;
pub mod teams;
