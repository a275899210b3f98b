//! The fetch command: download accident cards for every monitored locality
//! and month in the window, then enqueue each card into the buffer.
//!
//! Fetch failures are contained per (locality, month) — a dead month never
//! stops the iteration. Enqueue failures are contained per card: after the
//! bounded retries a card is diverted to a local side file for manual
//! inspection and replay rather than being lost.

use std::time::Duration;

use serde::Serialize;

use dtpdb_core::{AppConfig, Locality, MonthWindow};
use dtpdb_db::{with_retry, RetryPolicy};
use dtpdb_gibdd::{CardQuery, GibddClient};

use crate::fail_run_best_effort;

/// A fetched card that has not yet reached the buffer, with enough
/// provenance to enqueue or replay it.
#[derive(Debug, Clone, Serialize)]
struct PendingRecord {
    locality_name: String,
    region_id: String,
    district_id: String,
    raw_payload: serde_json::Value,
}

pub(crate) async fn run_fetch(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    window: MonthWindow,
) -> anyhow::Result<()> {
    let localities = dtpdb_core::load_localities(&config.localities_path)?.localities;

    let client = GibddClient::with_base_url(
        config.fetch_timeout_secs,
        &config.fetch_user_agent,
        &config.api_base_url,
    )
    .map_err(|e| anyhow::anyhow!("failed to build statistics client: {e}"))?;

    tracing::info!(%window, localities = localities.len(), "starting fetch run");

    let run = dtpdb_db::create_ingest_run(pool, "fetch", "cli").await?;
    if let Err(e) = dtpdb_db::start_ingest_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, "fetch", format!("{e:#}")).await;
        return Err(e.into());
    }

    let pending = download_all(&client, config, &localities, window).await;
    let fetched = pending.len();
    tracing::info!(fetched, "download phase complete");

    let enqueue_retry = RetryPolicy {
        max_attempts: config.enqueue_max_attempts,
        base_delay_secs: config.enqueue_backoff_base_secs,
    };

    let mut enqueued: usize = 0;
    let mut failed: Vec<PendingRecord> = Vec::new();

    for record in pending {
        let result = with_retry(enqueue_retry, || {
            dtpdb_db::enqueue(
                pool,
                &record.locality_name,
                &record.region_id,
                &record.district_id,
                &record.raw_payload,
            )
        })
        .await;

        match result {
            Ok(_) => enqueued += 1,
            Err(e) => {
                tracing::error!(
                    locality = %record.locality_name,
                    error = %e,
                    "failed to enqueue card — diverting to side file"
                );
                failed.push(record);
            }
        }
    }

    if !failed.is_empty() {
        write_side_file(&config.failed_records_path, &failed)?;
        tracing::warn!(
            count = failed.len(),
            path = %config.failed_records_path.display(),
            "some cards could not be enqueued; saved for manual replay"
        );
    }

    let processed = i32::try_from(enqueued).unwrap_or(i32::MAX);
    if let Err(err) = dtpdb_db::complete_ingest_run(pool, run.id, processed).await {
        fail_run_best_effort(pool, run.id, "fetch", format!("{err:#}")).await;
        return Err(err.into());
    }

    println!(
        "fetched {fetched} cards, enqueued {enqueued}, diverted {} to side file",
        failed.len()
    );
    Ok(())
}

/// Downloads cards for every locality and month, skipping failed windows.
async fn download_all(
    client: &GibddClient,
    config: &AppConfig,
    localities: &[Locality],
    window: MonthWindow,
) -> Vec<PendingRecord> {
    let mut pending = Vec::new();

    for locality in localities {
        tracing::info!(locality = %locality.name, "fetching locality");

        for (year, month) in window.months() {
            let query = CardQuery::for_month(&locality.region_id, &locality.district_id, year, month);

            match client.fetch_cards(&query).await {
                Ok(cards) => {
                    tracing::info!(
                        locality = %locality.name,
                        year,
                        month,
                        cards = cards.len(),
                        "month fetched"
                    );
                    pending.extend(cards.into_iter().map(|raw_payload| PendingRecord {
                        locality_name: locality.name.clone(),
                        region_id: locality.region_id.clone(),
                        district_id: locality.district_id.clone(),
                        raw_payload,
                    }));
                }
                Err(e) => {
                    tracing::warn!(
                        locality = %locality.name,
                        year,
                        month,
                        error = %e,
                        "skipping month — fetch failed"
                    );
                }
            }

            tokio::time::sleep(Duration::from_millis(config.fetch_pause_ms)).await;
        }
    }

    pending
}

/// Serializes un-enqueueable cards to a local artifact for manual replay.
fn write_side_file(path: &std::path::Path, failed: &[PendingRecord]) -> anyhow::Result<()> {
    let encoded = serde_json::to_string(failed)?;
    std::fs::write(path, encoded)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
    Ok(())
}
