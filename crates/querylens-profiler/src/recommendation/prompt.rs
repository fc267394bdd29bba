//! Prompt construction for the reasoning service.
//!
//! The user message carries exactly four inputs: the representative
//! statement, the plan tree, the sequential-scan flag and the execution time.
//! Nothing else about the database is disclosed.

use querylens_core::ExplainPlan;
use querylens_reasoning::ChatMessage;

pub const SYSTEM_PROMPT: &str = "You are a PostgreSQL performance expert.";

/// Section headings the `details` field must contain, in order.
pub const DETAIL_SECTIONS: [&str; 4] = [
    "Why this query may be slow",
    "What PostgreSQL is doing internally",
    "Specific, actionable optimizations",
    "Risks and tradeoffs",
];

const RULES: &str = "\
Rules:
- Base every statement on the inputs below. Do not assume table sizes, existing indexes, hardware, workload or schema details that are not shown.
- Do not invent metrics that are absent from the plan (row counts, costs, buffers, I/O, cache state).
- When the inputs are not enough to answer a section, write: \"Insufficient information provided to determine this conclusively.\"
- Only give advice that the observed plan justifies. Keep the tone neutral and precise.
- Reply with a single JSON object and nothing else: no markdown fences, no text before or after it.";

const CONFIDENCE_GUIDE: &str = "\
Set confidence_score between 0.0 and 1.0. Score high only when the plan shows the problem directly and the fix carries little risk. Score lower for inferred problems, situational fixes or fixes with side effects. Avoid 1.0 unless the improvement is certain.";

/// Builds the system and user messages for one analysis.
pub fn build_messages(
    sql: &str,
    plan: &ExplainPlan,
    seq_scan_detected: bool,
    execution_time_ms: Option<f64>,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_prompt(sql, plan, seq_scan_detected, execution_time_ms)),
    ]
}

fn user_prompt(
    sql: &str,
    plan: &ExplainPlan,
    seq_scan_detected: bool,
    execution_time_ms: Option<f64>,
) -> String {
    let plan_json = serde_json::to_string_pretty(&plan.to_json()).unwrap_or_default();
    let execution_time = execution_time_ms.map_or_else(|| "unknown".to_string(), |ms| format!("{ms}"));
    let sections = DETAIL_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, title)| format!("{}. {title}", i + 1))
        .collect::<Vec<_>>()
        .join("\\n");

    format!(
        "Diagnose the performance of the PostgreSQL statement below using only the inputs given.

{RULES}

Inputs:
SQL statement:
{sql}

Execution plan (JSON):
{plan_json}

Observations:
- Sequential scan detected: {seq_scan_detected}
- Execution time (ms): {execution_time}

Reply with this JSON object:
{{
  \"summary\": \"<the finding in under 50 words>\",
  \"details\": \"<four numbered sections: {sections}>\",
  \"confidence_score\": <number between 0.0 and 1.0>
}}

{CONFIDENCE_GUIDE}"
    )
}
