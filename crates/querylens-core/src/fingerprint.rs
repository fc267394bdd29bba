//! SQL fingerprinting.
//!
//! A fingerprint is the statement text with equality-comparison literals
//! replaced by `?`, so `WHERE id = 1` and `WHERE id = 42` aggregate under the
//! same pattern. This is a syntactic mask, not a parser: IN lists, ranges,
//! negative numbers and boolean literals are left untouched.

use std::sync::LazyLock;

use regex::Regex;

/// Placeholder substituted for masked literals.
pub const PLACEHOLDER: &str = "?";

// The leading group keeps `<=`, `>=` and `!=` out of the mask.
static EQUALITY_LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^<>!])=\s*(?:'[^']*'|\d+)").expect("valid regex")
});

/// Keywords that make a statement data-modifying wherever they appear.
const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "TRUNCATE", "INTO", "COPY", "CALL", "DROP", "ALTER",
    "CREATE", "GRANT", "REVOKE", "VACUUM", "LOCK",
];

/// Leading keywords of statements that only read.
const READ_KEYWORDS: &[&str] = &["SELECT", "WITH", "VALUES", "TABLE", "SHOW"];

/// Normalizes a SQL statement into its pattern form.
///
/// Every single-quoted string or bare integer on the right-hand side of an
/// `=` comparison becomes `= ?`. The function is pure and deterministic.
///
/// ```
/// use querylens_core::normalize_sql;
///
/// assert_eq!(
///     normalize_sql("SELECT * FROM t WHERE id = 42"),
///     "SELECT * FROM t WHERE id = ?"
/// );
/// ```
#[must_use]
pub fn normalize_sql(sql: &str) -> String {
    EQUALITY_LITERAL_RE
        .replace_all(sql, |caps: &regex::Captures<'_>| {
            format!("{}= {PLACEHOLDER}", &caps[1])
        })
        .into_owned()
}

/// Returns `true` when the statement is safe to execute for plan capture.
///
/// The first keyword must be a read keyword and no data-modifying keyword may
/// appear anywhere in the text. The check is conservative: a read that merely
/// mentions `UPDATE` (for example `FOR UPDATE`) is treated as a write.
#[must_use]
pub fn is_read_only_statement(sql: &str) -> bool {
    let mut words = keywords(strip_leading_noise(sql));

    let Some(first) = words.next() else {
        return false;
    };
    if !READ_KEYWORDS.iter().any(|k| first.eq_ignore_ascii_case(k)) {
        return false;
    }

    !words.any(|word| WRITE_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k)))
}

fn keywords(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
}

/// Skips whitespace, comments and opening parentheses before the first keyword.
fn strip_leading_noise(mut sql: &str) -> &str {
    loop {
        let trimmed = sql.trim_start().trim_start_matches('(');
        if let Some(rest) = trimmed.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return trimmed;
        }
    }
}
