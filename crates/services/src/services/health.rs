//! Database health report for `/api/health`.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;
use ts_rs::TS;

const REQUIRED_TABLES: &[&str] = &[
    "users",
    "sessions",
    "cleaners",
    "owners",
    "properties",
    "bookings",
    "booking_notifications",
    "platform_settings",
];

#[derive(Debug, Clone, Serialize, TS)]
pub struct HealthReport {
    pub database_ok: bool,
    pub migrations_applied: i64,
    pub latest_migration: Option<String>,
    pub missing_tables: Vec<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.database_ok && self.missing_tables.is_empty()
    }
}

pub async fn check_database(pool: &SqlitePool) -> HealthReport {
    match inspect(pool).await {
        Ok(report) => {
            if !report.missing_tables.is_empty() {
                warn!(missing = ?report.missing_tables, "Database schema incomplete");
            }
            report
        }
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            HealthReport {
                database_ok: false,
                migrations_applied: 0,
                latest_migration: None,
                missing_tables: vec![],
            }
        }
    }
}

async fn inspect(pool: &SqlitePool) -> Result<HealthReport, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await?;

    let migrations_applied =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;
    let latest_migration = sqlx::query_scalar::<_, String>(
        "SELECT description FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    let mut missing_tables = Vec::new();
    for table in REQUIRED_TABLES {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
        )
        .bind(table)
        .fetch_one(pool)
        .await?
            > 0;
        if !exists {
            missing_tables.push(table.to_string());
        }
    }

    Ok(HealthReport {
        database_ok: true,
        migrations_applied,
        latest_migration,
        missing_tables,
    })
}
