pub mod analysis;
pub mod patterns;
pub mod probe;
pub mod recommend;
pub mod schema;

use std::sync::Arc;

use anyhow::{Context, Result};
use querylens_db_postgres::{PostgresStorage, verify_schema};
use tracing::info;

use crate::config::AppConfig;

/// Opens the profiler storage and checks that its schema is in place.
pub(crate) async fn connect(config: &AppConfig) -> Result<Arc<PostgresStorage>> {
    let storage = PostgresStorage::new(config.database.clone())
        .await
        .context("Failed to open profiler storage")?;
    verify_schema(storage.pool())
        .await
        .context("Profiler schema missing, run `querylens migrate`")?;
    info!("Connected to profiler storage");
    Ok(Arc::new(storage))
}
