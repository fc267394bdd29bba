use anyhow::{Context, Result};
use querylens_db_postgres::{create_pool, migrations};

use crate::config::AppConfig;
use crate::output::print_success;

pub async fn migrate(config: &AppConfig) -> Result<()> {
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create connection pool")?;
    migrations::run(&pool).await.context("Migration failed")?;
    print_success(&format!(
        "Profiler schema up to date ({} migrations)",
        migrations::count()
    ));
    Ok(())
}
