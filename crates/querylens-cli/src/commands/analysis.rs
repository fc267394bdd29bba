use std::sync::Arc;

use anyhow::Result;
use querylens_db_postgres::PostgresPlanCapture;
use querylens_profiler::{AnalysisPipeline, CandidateSelector, PlanAnalyzer};
use serde_json::json;

use crate::cli::{LimitArgs, OutputFormat};
use crate::commands::connect;
use crate::config::AppConfig;
use crate::output::{print_analyses, print_candidates, print_json};

pub async fn candidates(config: &AppConfig, args: &LimitArgs, format: OutputFormat) -> Result<()> {
    let storage = connect(config).await?;
    let selector = CandidateSelector::new(storage, config.candidates.clone());
    let candidates = selector
        .select_candidates(args.limit.unwrap_or(config.candidates.limit))
        .await?;

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = candidates
                .iter()
                .map(|c| {
                    json!({
                        "candidate": c,
                        "level": config.candidates.classify(c),
                    })
                })
                .collect();
            print_json(&rows)?;
        }
        OutputFormat::Table => print_candidates(&candidates, &config.candidates),
    }
    Ok(())
}

pub async fn analyze(config: &AppConfig, args: &LimitArgs, format: OutputFormat) -> Result<()> {
    let storage = connect(config).await?;
    let capture = PostgresPlanCapture::new(storage.pool().clone())
        .with_statement_timeout_ms(config.database.explain_timeout_ms);
    let pipeline = AnalysisPipeline::new(
        CandidateSelector::new(storage.clone(), config.candidates.clone()),
        PlanAnalyzer::new(storage, Arc::new(capture)),
    );

    let analyses = pipeline
        .analyze_slow_queries(args.limit.unwrap_or(config.candidates.limit))
        .await?;

    match format {
        OutputFormat::Json => print_json(&analyses)?,
        OutputFormat::Table => print_analyses(&analyses),
    }
    Ok(())
}
