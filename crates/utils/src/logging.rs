//! Tracing subscriber and optional Sentry reporting.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,server=debug,services=debug,db=info";

/// Keeps the Sentry client alive for the lifetime of the process.
pub struct LoggingGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Install the global subscriber. When `sentry_dsn` is set, errors and
/// panics are also forwarded to Sentry.
pub fn init(sentry_dsn: Option<&str>) -> LoggingGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let sentry_guard = sentry_dsn.filter(|dsn| !dsn.trim().is_empty()).map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                attach_stacktrace: true,
                ..Default::default()
            },
        ))
    });

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));

    if sentry_guard.is_some() {
        registry.with(sentry_tracing::layer()).init();
    } else {
        registry.init();
    }

    LoggingGuard {
        _sentry: sentry_guard,
    }
}
