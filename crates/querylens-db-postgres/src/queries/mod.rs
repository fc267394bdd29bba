//! SQL query modules for the PostgreSQL storage backend.
//!
//! One module per profiler table. Every function takes the pool (or an open
//! transaction) explicitly and maps driver errors into `StorageError`.

pub mod analyses;
pub mod executions;
pub mod patterns;
pub mod recommendations;

/// Converts a caller-supplied limit into a SQL `LIMIT` parameter.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
