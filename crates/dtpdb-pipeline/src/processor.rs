//! The batch processor: drains eligible buffer rows into the `accidents`
//! table, moving each row to exactly one terminal state.
//!
//! Per-row state machine: `Eligible → Processing → {Committed, Quarantined}`.
//! A transient store failure mid-row leaves the row Eligible — an outage is
//! not evidence the data is bad, so the next invocation of the job retries
//! it. Only a malformed payload or a persistent write failure quarantines.

use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;

use dtpdb_core::Provenance;
use dtpdb_db::{buffer, insert_accident_if_absent, with_retry, BufferRow, DbError, RetryPolicy};

use crate::normalize::{normalize, NormalizeError};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A batch-level store operation failed even after retries; the run
    /// cannot make progress and aborts.
    #[error("store error during batch processing: {0}")]
    Store(#[from] DbError),
}

/// Tuning knobs for a processing run.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    /// Maximum rows pulled per batch selection.
    pub batch_size: i64,
    /// Pause after each row, bounding request rate against the store.
    pub record_pause_ms: u64,
    /// Pause after each batch.
    pub batch_pause_ms: u64,
    /// Backoff policy for state-transition and batch-selection calls.
    pub store_retry: RetryPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            record_pause_ms: 500,
            batch_pause_ms: 2000,
            store_retry: RetryPolicy::default(),
        }
    }
}

impl ProcessorConfig {
    #[must_use]
    pub fn from_app_config(config: &dtpdb_core::AppConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            record_pause_ms: config.record_pause_ms,
            batch_pause_ms: config.batch_pause_ms,
            store_retry: RetryPolicy::default(),
        }
    }
}

/// Aggregate counts reported at the end of a processing run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingSummary {
    /// Buffer rows moved to the processed state.
    pub committed: u64,
    /// Buffer rows moved to the error state.
    pub quarantined: u64,
    /// Buffer rows left eligible because of transient store trouble; a
    /// future run will pick them up again.
    pub skipped: u64,
    /// Normalized records actually written.
    pub records_written: u64,
    /// Normalized records skipped as already present (duplicate card ids).
    pub records_deduplicated: u64,
}

/// What happened to a single buffer row.
#[derive(Debug)]
enum RowOutcome {
    Committed { written: u64, deduplicated: u64 },
    Quarantined,
    SkippedTransient,
}

/// Processes eligible buffer rows in bounded batches until a selection
/// returns empty, then reports aggregate counts.
///
/// Rows are handled strictly sequentially in ascending-id order within each
/// batch; a short pause follows each row and each batch.
///
/// # Errors
///
/// Returns [`PipelineError::Store`] when batch selection fails even after
/// retries; per-row failures never abort the run.
pub async fn run_to_exhaustion(
    pool: &PgPool,
    config: &ProcessorConfig,
) -> Result<ProcessingSummary, PipelineError> {
    let mut summary = ProcessingSummary::default();

    loop {
        let batch = with_retry(config.store_retry, || {
            buffer::select_batch(pool, config.batch_size)
        })
        .await?;

        if batch.is_empty() {
            tracing::info!("no more eligible rows — processing complete");
            break;
        }

        tracing::info!(rows = batch.len(), "processing batch");

        for row in &batch {
            let outcome = process_row(pool, row, config).await;
            match outcome {
                RowOutcome::Committed {
                    written,
                    deduplicated,
                } => {
                    summary.committed += 1;
                    summary.records_written += written;
                    summary.records_deduplicated += deduplicated;
                }
                RowOutcome::Quarantined => summary.quarantined += 1,
                RowOutcome::SkippedTransient => summary.skipped += 1,
            }

            tokio::time::sleep(Duration::from_millis(config.record_pause_ms)).await;
        }

        tracing::debug!(pause_ms = config.batch_pause_ms, "batch done — pausing");
        tokio::time::sleep(Duration::from_millis(config.batch_pause_ms)).await;
    }

    tracing::info!(
        committed = summary.committed,
        quarantined = summary.quarantined,
        skipped = summary.skipped,
        records_written = summary.records_written,
        records_deduplicated = summary.records_deduplicated,
        "processing run finished"
    );

    Ok(summary)
}

/// Runs one buffer row through normalize → persist → state transition.
///
/// Earlier records of the same row that were already inserted stay committed
/// even when a later record fails; each insert is independent. The whole row
/// then quarantines, accepting partial normalization over rollback
/// machinery.
async fn process_row(pool: &PgPool, row: &BufferRow, config: &ProcessorConfig) -> RowOutcome {
    let provenance = Provenance {
        locality_name: row.locality_name.clone(),
        region_id: row.region_id.clone(),
        district_id: row.district_id.clone(),
    };

    let records = match normalize(&row.raw_payload, &provenance) {
        Ok(records) => records,
        Err(err @ NormalizeError::MalformedPayload { .. }) => {
            tracing::error!(row_id = row.id, error = %err, "quarantining row — malformed payload");
            return quarantine_row(pool, row.id, config).await;
        }
    };

    let mut written = 0u64;
    let mut deduplicated = 0u64;

    for record in &records {
        match insert_accident_if_absent(pool, record).await {
            Ok(true) => written += 1,
            Ok(false) => {
                tracing::debug!(
                    row_id = row.id,
                    card_id = %record.card_id,
                    "card already present — skipping insert"
                );
                deduplicated += 1;
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(
                    row_id = row.id,
                    card_id = %record.card_id,
                    error = %err,
                    "transient store error — leaving row eligible for the next run"
                );
                return RowOutcome::SkippedTransient;
            }
            Err(err) => {
                tracing::error!(
                    row_id = row.id,
                    card_id = %record.card_id,
                    error = %err,
                    "quarantining row — persistent insert failure"
                );
                return quarantine_row(pool, row.id, config).await;
            }
        }
    }

    match with_retry(config.store_retry, || buffer::mark_processed(pool, row.id)).await {
        Ok(()) => {
            tracing::info!(
                row_id = row.id,
                records = records.len(),
                written,
                "row committed"
            );
            RowOutcome::Committed {
                written,
                deduplicated,
            }
        }
        Err(err) => {
            // Inserts are conflict-tolerant, so re-processing this row later
            // is harmless: the cards dedup and the mark is attempted again.
            tracing::error!(
                row_id = row.id,
                error = %err,
                "failed to mark row processed — leaving it eligible"
            );
            RowOutcome::SkippedTransient
        }
    }
}

/// Moves a row to its quarantined state via a retried `mark_error`. When the
/// mark itself cannot be persisted the row stays Eligible and the failure is
/// logged; a future run will retry the whole row.
async fn quarantine_row(pool: &PgPool, row_id: i64, config: &ProcessorConfig) -> RowOutcome {
    match with_retry(config.store_retry, || buffer::mark_error(pool, row_id)).await {
        Ok(()) => RowOutcome::Quarantined,
        Err(err) => {
            tracing::error!(
                row_id,
                error = %err,
                "failed to mark row as errored — leaving it eligible"
            );
            RowOutcome::SkippedTransient
        }
    }
}
