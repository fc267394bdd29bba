use std::sync::Arc;

use anyhow::Result;
use querylens_core::is_read_only_statement;
use querylens_db_postgres::InstrumentedPool;
use querylens_profiler::ExecutionRecorder;
use serde_json::json;

use crate::cli::{OutputFormat, ProbeArgs};
use crate::commands::connect;
use crate::config::AppConfig;
use crate::output::{print_error, print_json, print_success};

/// Runs the given statements through an instrumented pool.
///
/// Failing statements are reported and recorded with their error; they do not
/// stop the run.
pub async fn probe(config: &AppConfig, args: &ProbeArgs, format: OutputFormat) -> Result<()> {
    let storage = connect(config).await?;
    let recorder = Arc::new(ExecutionRecorder::new(
        storage.clone(),
        config.recorder.clone(),
    ));
    let pool = InstrumentedPool::new(storage.pool().clone()).with_listener(recorder.clone());

    let mut failures = 0usize;
    for _ in 0..args.repeat {
        for sql in &args.statements {
            let result = if is_read_only_statement(sql) {
                pool.fetch_all(sql, &[]).await.map(|rows| rows.len() as u64)
            } else {
                pool.execute(sql, &[]).await
            };
            if let Err(e) = result {
                failures += 1;
                if format == OutputFormat::Table {
                    print_error(&format!("{sql}: {e}"));
                }
            }
        }
    }

    let stats = recorder.stats();
    match format {
        OutputFormat::Json => print_json(&json!({
            "failures": failures,
            "recorder": stats,
            "mean_persist_ms": stats.mean_persist_ms(),
        }))?,
        OutputFormat::Table => print_success(&format!(
            "Recorded {} executions ({} skipped, {} dropped, {failures} failed statements, {:.2} ms mean overhead)",
            stats.recorded,
            stats.skipped_internal,
            stats.dropped,
            stats.mean_persist_ms()
        )),
    }
    Ok(())
}
