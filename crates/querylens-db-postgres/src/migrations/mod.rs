//! Database migration management for the PostgreSQL storage backend.
//!
//! Migrations are embedded in the binary, so the profiler schema can be
//! created from any deployment without shipping the SQL files.

use sqlx_core::migrate::{Migration, MigrationType};
use sqlx_postgres::PgPool;
use std::borrow::Cow;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result};

/// Embedded migrations, in chronological order.
///
/// Each entry is a tuple of (version, description, sql).
macro_rules! embedded_migrations {
    () => {
        &[
            (
                20250301000001i64,
                "query_patterns",
                include_str!("../../migrations/20250301000001_query_patterns.sql"),
            ),
            (
                20250301000002i64,
                "query_analyses",
                include_str!("../../migrations/20250301000002_query_analyses.sql"),
            ),
            (
                20250301000003i64,
                "query_recommendations",
                include_str!("../../migrations/20250301000003_query_recommendations.sql"),
            ),
        ]
    };
}

/// Builds the migration list from the embedded SQL.
fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Number of embedded migrations.
#[must_use]
pub fn count() -> usize {
    embedded_migrations!().len()
}

/// Runs all pending profiler migrations.
///
/// Applied versions are tracked in `_sqlx_migrations`. Running twice is a
/// no-op.
///
/// To add a migration, create the SQL file under `migrations/` and append an
/// entry to `embedded_migrations!`.
///
/// # Errors
///
/// Returns an error if a migration fails to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running profiler migrations");

    let migrator = sqlx_core::migrate::Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| PostgresError::Migration(format!("Migration failed: {e}")))?;

    info!("Profiler migrations completed");

    Ok(())
}
