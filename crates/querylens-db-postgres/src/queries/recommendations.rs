//! Recommendation queries.

use chrono::{DateTime, Utc};
use querylens_core::{PatternId, Recommendation, Severity};
use querylens_storage::{NewRecommendation, StorageError};
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use crate::error::query_error;

type RecommendationRow = (i64, i64, DateTime<Utc>, String, String, String, f64);

/// Persists a validated recommendation with a single insert.
pub async fn insert(
    pool: &PgPool,
    recommendation: &NewRecommendation,
) -> Result<Recommendation, StorageError> {
    let id: i64 = query_scalar(
        r#"INSERT INTO query_recommendations
               (pattern_id, generated_at, severity, summary, details, confidence_score)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id"#,
    )
    .bind(recommendation.pattern_id)
    .bind(recommendation.generated_at)
    .bind(recommendation.severity.as_str())
    .bind(&recommendation.summary)
    .bind(&recommendation.details)
    .bind(recommendation.confidence_score)
    .fetch_one(pool)
    .await
    .map_err(|e| query_error("Failed to insert recommendation", e))?;

    Ok(recommendation.clone().into_recommendation(id))
}

/// Every recommendation for the given patterns, newest first.
pub async fn for_patterns(
    pool: &PgPool,
    pattern_ids: &[PatternId],
) -> Result<Vec<Recommendation>, StorageError> {
    let rows: Vec<RecommendationRow> = query_as(
        r#"SELECT id, pattern_id, generated_at, severity, summary, details, confidence_score
           FROM query_recommendations
           WHERE pattern_id = ANY($1)
           ORDER BY generated_at DESC, id DESC"#,
    )
    .bind(pattern_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| query_error("Failed to load recommendations", e))?;

    rows.into_iter()
        .map(
            |(id, pattern_id, generated_at, severity, summary, details, confidence_score)|
             -> Result<Recommendation, StorageError> {
                Ok(Recommendation {
                    id,
                    pattern_id,
                    generated_at,
                    severity: severity.parse::<Severity>()?,
                    summary,
                    details,
                    confidence_score,
                })
            },
        )
        .collect()
}
