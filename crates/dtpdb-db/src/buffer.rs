//! Database operations for the `accident_buffer` staging table.
//!
//! The buffer is append-only: the fetch stage enqueues raw payloads, the
//! processor selects eligible rows oldest-first and moves each to exactly one
//! terminal state (`processed_at` set, or `is_error = TRUE`). A row is
//! eligible iff `processed_at IS NULL AND is_error = FALSE`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `accident_buffer` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BufferRow {
    pub id: i64,
    pub locality_name: String,
    pub region_id: String,
    pub district_id: String,
    pub raw_payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub is_error: bool,
}

impl BufferRow {
    /// Whether the processor may still pick this row up.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.processed_at.is_none() && !self.is_error
    }
}

/// Appends a raw payload to the buffer and returns the new row's `id`.
///
/// The row starts eligible: `processed_at = NULL`, `is_error = FALSE`.
/// Safe to call concurrently from multiple fetch operations; no ordering is
/// guaranteed across localities or windows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn enqueue(
    pool: &PgPool,
    locality_name: &str,
    region_id: &str,
    district_id: &str,
    raw_payload: &serde_json::Value,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO accident_buffer (locality_name, region_id, district_id, raw_payload) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id",
    )
    .bind(locality_name)
    .bind(region_id)
    .bind(district_id)
    .bind(raw_payload)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns up to `limit` eligible rows, ordered by ascending `id`.
///
/// Oldest-first ordering guarantees progress and fairness: a steady stream
/// of new inserts can never starve the earliest unprocessed rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn select_batch(pool: &PgPool, limit: i64) -> Result<Vec<BufferRow>, DbError> {
    let rows = sqlx::query_as::<_, BufferRow>(
        "SELECT id, locality_name, region_id, district_id, raw_payload, \
                fetched_at, processed_at, is_error \
         FROM accident_buffer \
         WHERE processed_at IS NULL AND is_error = FALSE \
         ORDER BY id \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Sets `processed_at = NOW()` on a row, moving it to its terminal
/// committed state. Idempotent: marking an already-processed row is a no-op.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_processed(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE accident_buffer \
         SET processed_at = NOW() \
         WHERE id = $1 AND processed_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Sets `is_error = TRUE` on a row, quarantining it from further automatic
/// processing. Idempotent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_error(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE accident_buffer \
         SET is_error = TRUE \
         WHERE id = $1 AND is_error = FALSE",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Counts rows still eligible for processing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_eligible(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM accident_buffer \
         WHERE processed_at IS NULL AND is_error = FALSE",
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Counts quarantined rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_errored(pool: &PgPool) -> Result<i64, DbError> {
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accident_buffer WHERE is_error = TRUE")
            .fetch_one(pool)
            .await?;

    Ok(count)
}

/// Counts all buffer rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_total(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accident_buffer")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_requires_both_flags_clear() {
        let base = BufferRow {
            id: 1,
            locality_name: "Лобня".to_string(),
            region_id: "46".to_string(),
            district_id: "46440".to_string(),
            raw_payload: serde_json::json!({"KartId": "K1"}),
            fetched_at: Utc::now(),
            processed_at: None,
            is_error: false,
        };
        assert!(base.is_eligible());

        let processed = BufferRow {
            processed_at: Some(Utc::now()),
            ..base.clone()
        };
        assert!(!processed.is_eligible());

        let errored = BufferRow {
            is_error: true,
            ..base
        };
        assert!(!errored.is_eligible());
    }
}
