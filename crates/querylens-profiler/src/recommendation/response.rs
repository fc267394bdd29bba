//! Structural validation of reasoning-service replies.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Summary length bounds, in characters after trimming.
pub const SUMMARY_MIN_CHARS: usize = 10;
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Minimum details length, in characters after trimming.
pub const DETAILS_MIN_CHARS: usize = 20;

/// Numbered section markers: `1.` to `4.` at line start or after whitespace.
/// The character after the dot is checked separately so adjacent markers
/// share their separating whitespace.
static SECTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)([1-4])\.").expect("valid regex"));

/// A reply that failed validation.
#[derive(Debug, Error, PartialEq)]
pub enum ResponseError {
    #[error("Reply is not a JSON object: {0}")]
    NotJson(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} has the wrong type, expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Summary must be 10 to 500 characters, got {0}")]
    SummaryLength(usize),

    #[error("Details must be at least 20 characters, got {0}")]
    DetailsTooShort(usize),

    #[error("Details must contain numbered sections 1. to 4. in order")]
    MissingSections,

    #[error("Confidence score must be a number in [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),
}

/// A reply that passed validation. Fields are trimmed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationDraft {
    pub summary: String,
    pub details: String,
    /// Raw score as reported, before any guardrail.
    pub confidence_score: f64,
}

/// Parses and validates a raw reply.
///
/// A single surrounding markdown code fence is tolerated. Extra fields are
/// ignored.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn parse_response(raw: &str) -> Result<RecommendationDraft, ResponseError> {
    let body = strip_code_fence(raw.trim());
    let mut reply = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => return Err(ResponseError::NotJson(format!("found {}", json_kind(&other)))),
        Err(e) => return Err(ResponseError::NotJson(e.to_string())),
    };

    let summary = required_string(reply.remove("summary"), "summary")?;
    let details = required_string(reply.remove("details"), "details")?;
    let confidence_score = match reply.remove("confidence_score") {
        None | Some(Value::Null) => return Err(ResponseError::MissingField("confidence_score")),
        Some(Value::Number(n)) => n.as_f64().ok_or(ResponseError::WrongType {
            field: "confidence_score",
            expected: "number",
        })?,
        Some(_) => {
            return Err(ResponseError::WrongType {
                field: "confidence_score",
                expected: "number",
            });
        }
    };

    let summary_len = summary.chars().count();
    if !(SUMMARY_MIN_CHARS..=SUMMARY_MAX_CHARS).contains(&summary_len) {
        return Err(ResponseError::SummaryLength(summary_len));
    }

    let details_len = details.chars().count();
    if details_len < DETAILS_MIN_CHARS {
        return Err(ResponseError::DetailsTooShort(details_len));
    }
    if !has_ordered_sections(&details) {
        return Err(ResponseError::MissingSections);
    }

    if !confidence_score.is_finite() || !(0.0..=1.0).contains(&confidence_score) {
        return Err(ResponseError::ConfidenceOutOfRange(confidence_score));
    }

    Ok(RecommendationDraft {
        summary,
        details,
        confidence_score,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn required_string(value: Option<Value>, field: &'static str) -> Result<String, ResponseError> {
    match value {
        None | Some(Value::Null) => Err(ResponseError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(_) => Err(ResponseError::WrongType {
            field,
            expected: "string",
        }),
    }
}

/// True when markers `1.` through `4.` appear as an ordered subsequence.
fn has_ordered_sections(details: &str) -> bool {
    let mut expected = b'1';
    for caps in SECTION_MARKER.captures_iter(details) {
        let end = caps.get(0).map_or(0, |m| m.end());
        let bounded = details[end..].chars().next().is_none_or(char::is_whitespace);
        if bounded && caps[1].as_bytes()[0] == expected {
            if expected == b'4' {
                return true;
            }
            expected += 1;
        }
    }
    false
}

fn strip_code_fence(body: &str) -> &str {
    let Some(rest) = body.strip_prefix("```") else {
        return body;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return body;
    };
    // Drop an info string such as `json` on the opening line.
    match inner.split_once('\n') {
        Some((info, content)) if !info.trim_start().starts_with('{') => content.trim(),
        _ => inner.trim(),
    }
}
