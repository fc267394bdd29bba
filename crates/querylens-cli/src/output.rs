use colored::Colorize;
use querylens_core::{PlanAnalysis, Recommendation, Severity};
use querylens_profiler::{CandidateConfig, RecommendationOutcome};
use querylens_storage::{PatternOverview, SlowQueryCandidate};
use serde::Serialize;
use serde_json::{Value, json};
use tabled::builder::Builder;
use tabled::settings::Style;

/// Longest SQL text shown in a table cell.
const SQL_CELL_WIDTH: usize = 60;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_candidates(candidates: &[SlowQueryCandidate], config: &CandidateConfig) {
    if candidates.is_empty() {
        println!("No slow-query candidates.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Pattern", "Avg (ms)", "Executions", "Level", "SQL"]);
    for candidate in candidates {
        builder.push_record([
            candidate.pattern.id.to_string(),
            format!("{:.1}", candidate.avg_duration_ms),
            candidate.execution_count.to_string(),
            config.classify(candidate).to_string(),
            truncate(&candidate.pattern.normalized_sql, SQL_CELL_WIDTH),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

pub fn print_analyses(analyses: &[PlanAnalysis]) {
    if analyses.is_empty() {
        println!("No analyses produced.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Analysis", "Pattern", "Exec (ms)", "Seq scan", "Index scan"]);
    for analysis in analyses {
        builder.push_record([
            analysis.id.to_string(),
            analysis.pattern_id.to_string(),
            analysis
                .execution_time_ms
                .map_or_else(|| "-".to_string(), |ms| format!("{ms:.1}")),
            yes_no(analysis.seq_scan_detected),
            yes_no(analysis.index_scan_detected),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

pub fn print_outcomes(outcomes: &[(i64, RecommendationOutcome)]) {
    if outcomes.is_empty() {
        println!("No analyses to recommend on.");
        return;
    }
    for (analysis_id, outcome) in outcomes {
        match outcome.recommendation() {
            Some(recommendation) => print_recommendation(*analysis_id, recommendation),
            None => println!(
                "{} analysis {analysis_id}: {outcome}",
                "-".yellow()
            ),
        }
    }
}

fn print_recommendation(analysis_id: i64, recommendation: &Recommendation) {
    let severity = match recommendation.severity {
        Severity::High => "HIGH".red().bold(),
        Severity::Medium => "MEDIUM".yellow().bold(),
    };
    println!(
        "{} analysis {analysis_id} -> recommendation {} [{severity}] confidence {:.2}",
        "✓".green(),
        recommendation.id,
        recommendation.confidence_score
    );
    println!("  {}", recommendation.summary.cyan());
    for line in recommendation.details.lines() {
        println!("  {line}");
    }
}

/// JSON shape for recommendation outcomes.
pub fn outcomes_json(outcomes: &[(i64, RecommendationOutcome)]) -> Value {
    Value::Array(
        outcomes
            .iter()
            .map(|(analysis_id, outcome)| {
                json!({
                    "analysis_id": analysis_id,
                    "outcome": outcome.label(),
                    "message": outcome.to_string(),
                    "recommendation": outcome.recommendation(),
                })
            })
            .collect(),
    )
}

pub fn print_overviews(overviews: &[PatternOverview]) {
    if overviews.is_empty() {
        println!("No patterns recorded yet.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record([
        "Pattern",
        "Executions",
        "Last seen",
        "Analyses",
        "Latest advice",
        "SQL",
    ]);
    for overview in overviews {
        let advice = overview
            .recommendations
            .first()
            .map_or_else(|| "-".to_string(), |r| format!("{} ({:.2})", r.severity, r.confidence_score));
        builder.push_record([
            overview.pattern.id.to_string(),
            overview.pattern.total_executions.to_string(),
            overview.pattern.last_seen_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            overview.analyses.len().to_string(),
            advice,
            truncate(&overview.pattern.normalized_sql, SQL_CELL_WIDTH),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "yes" } else { "no" };
    text.to_string()
}

fn truncate(text: &str, width: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= width {
        flat
    } else {
        let mut cut: String = flat.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
