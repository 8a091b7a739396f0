use anyhow::Context;
use db::DBService;
use server::{app, config::Config, state::AppState};
use services::services::booking_reminder::BookingReminderService;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let _logging = utils::logging::init(config.sentry_dsn.as_deref());

    let db = DBService::new(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to open database")?;
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(db, config)?;

    let _reminders = if state.config.reminder_scheduler_enabled {
        Some(
            BookingReminderService::spawn(
                state.db.clone(),
                state.notifications.clone(),
                state.config.reminder_interval,
            )
            .await,
        )
    } else {
        info!("In-process reminder scheduler disabled; relying on /api/cron/booking-reminders");
        None
    };

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!(address = %listener.local_addr()?, channel = state.notifications.channel(), "Server listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
