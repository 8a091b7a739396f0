pub mod audit_log;
pub mod booking;
pub mod booking_notification;
pub mod cleaner;
pub mod feedback;
pub mod owner;
pub mod pending_onboarding;
pub mod platform_settings;
pub mod property;
pub mod rate_limit;
pub mod review;
pub mod session;
pub mod support_conversation;
pub mod team;
pub mod user;
