use anyhow::Result;
use querylens_storage::load_pattern_overviews;

use crate::cli::{LimitArgs, OutputFormat};
use crate::commands::connect;
use crate::config::AppConfig;
use crate::output::{print_json, print_overviews};

const DEFAULT_PATTERN_LIMIT: usize = 20;

pub async fn patterns(config: &AppConfig, args: &LimitArgs, format: OutputFormat) -> Result<()> {
    let storage = connect(config).await?;
    let overviews =
        load_pattern_overviews(storage.as_ref(), args.limit.unwrap_or(DEFAULT_PATTERN_LIMIT))
            .await?;

    match format {
        OutputFormat::Json => print_json(&overviews)?,
        OutputFormat::Table => print_overviews(&overviews),
    }
    Ok(())
}
