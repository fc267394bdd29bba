use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "querylens")]
#[command(about = "querylens: find slow SQL patterns and explain them")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (overrides QUERYLENS_CONFIG, default querylens.toml)
    #[arg(short, long, global = true, env = "QUERYLENS_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply the profiler schema migrations
    Migrate,
    /// Run statements through the instrumented pool so they are recorded
    Probe(ProbeArgs),
    /// List slow-query candidates
    Candidates(LimitArgs),
    /// Capture and store execution plans for the current candidates
    Analyze(LimitArgs),
    /// Generate recommendations from stored analyses
    Recommend(RecommendArgs),
    /// Show recently seen patterns with their history
    Patterns(LimitArgs),
    /// Print the effective configuration with secrets masked
    Config,
}

#[derive(Args)]
pub struct ProbeArgs {
    /// SQL statements to execute, in order
    #[arg(required = true)]
    pub statements: Vec<String>,
    /// Run each statement this many times
    #[arg(short, long, default_value_t = 1)]
    pub repeat: u32,
}

#[derive(Args)]
pub struct LimitArgs {
    /// Maximum number of entries
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct RecommendArgs {
    /// Generate a recommendation for one analysis
    #[arg(long)]
    pub analysis_id: Option<i64>,
    /// Generate recommendations for the N most recent analyses
    #[arg(long, value_name = "N")]
    pub latest: Option<usize>,
}
