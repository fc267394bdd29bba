//! Application configuration.
//!
//! Loaded from a TOML file and `QUERYLENS__SECTION__KEY` environment
//! overrides, e.g. `QUERYLENS__CANDIDATES__SLOW_QUERY_MS=250`.

use querylens_db_postgres::{PoolSettings, PostgresConfig, mask_password};
use querylens_profiler::{CandidateConfig, RecommendationConfig, RecorderConfig};
use querylens_reasoning::ReasoningConfig;
use serde::{Deserialize, Serialize};

/// Config file used when neither `--config` nor `QUERYLENS_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "querylens.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: PostgresConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub candidates: CandidateConfig,
    #[serde(default)]
    pub recommendation: RecommendationConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("database.url must not be empty".into());
        }
        PoolSettings::from_config(&self.database).map_err(|e| format!("database: {e}"))?;
        self.candidates
            .validate()
            .map_err(|e| format!("candidates: {e}"))?;
        self.recommendation
            .validate()
            .map_err(|e| format!("recommendation: {e}"))?;
        self.reasoning
            .validate()
            .map_err(|e| format!("reasoning: {e}"))?;

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    /// A copy safe to print: database password and API key are masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.database.url = mask_password(&copy.database.url);
        if copy.reasoning.api_key.is_some() {
            copy.reasoning.api_key = Some("****".into());
        }
        copy
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File, FileFormat};
    use std::path::PathBuf;

    /// Loads, merges and validates the configuration.
    ///
    /// A missing file is not an error: defaults and environment overrides
    /// still apply.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(super::DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf).format(FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix("QUERYLENS")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("recorder.extra_ignored_tables"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
