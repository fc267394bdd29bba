use std::sync::Arc;

use anyhow::{Context, Result};
use querylens_profiler::RecommendationEngine;
use querylens_reasoning::HttpReasoningClient;

use crate::cli::{OutputFormat, RecommendArgs};
use crate::commands::connect;
use crate::config::AppConfig;
use crate::output::{outcomes_json, print_json, print_outcomes};

pub async fn recommend(
    config: &AppConfig,
    args: &RecommendArgs,
    format: OutputFormat,
) -> Result<()> {
    let storage = connect(config).await?;
    let reasoner = HttpReasoningClient::new(config.reasoning.clone())
        .context("Failed to build reasoning client")?;
    let engine = RecommendationEngine::new(
        storage,
        Arc::new(reasoner),
        config.recommendation.clone(),
    );

    let outcomes = match (args.analysis_id, args.latest) {
        (Some(id), _) => vec![(id, engine.generate(id).await)],
        (None, Some(limit)) => engine.generate_latest(limit).await?,
        (None, None) => anyhow::bail!("Pass --analysis-id or --latest"),
    };

    match format {
        OutputFormat::Json => print_json(&outcomes_json(&outcomes))?,
        OutputFormat::Table => print_outcomes(&outcomes),
    }
    Ok(())
}
