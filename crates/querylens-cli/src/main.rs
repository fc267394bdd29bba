use anyhow::Result;
use clap::Parser;

use querylens_cli::cli::{Cli, Commands, OutputFormat};
use querylens_cli::config::{AppConfig, DEFAULT_CONFIG_PATH, loader::load_config};
use querylens_cli::output::{print_error, print_json};
use querylens_cli::{commands, observability};

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }

    observability::init_tracing_with_level("warn");

    let cli = Cli::parse();
    // --config, then QUERYLENS_CONFIG (read by clap), then the default path.
    let config_path = cli
        .config
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            print_error(&format!("Configuration error: {e}"));
            std::process::exit(2);
        }
    };
    observability::apply_logging_level(&config.logging.level);
    tracing::debug!(path = %config_path, "Configuration loaded");

    if let Err(e) = run(&cli, &config).await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    let format = cli.format;

    match &cli.command {
        Commands::Migrate => commands::schema::migrate(config).await?,
        Commands::Probe(args) => commands::probe::probe(config, args, format).await?,
        Commands::Candidates(args) => {
            commands::analysis::candidates(config, args, format).await?;
        }
        Commands::Analyze(args) => commands::analysis::analyze(config, args, format).await?,
        Commands::Recommend(args) => {
            commands::recommend::recommend(config, args, format).await?;
        }
        Commands::Patterns(args) => commands::patterns::patterns(config, args, format).await?,
        Commands::Config => {
            let redacted = config.redacted();
            match format {
                OutputFormat::Json => print_json(&redacted)?,
                OutputFormat::Table => print!("{}", toml::to_string_pretty(&redacted)?),
            }
        }
    }

    Ok(())
}
