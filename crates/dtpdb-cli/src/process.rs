//! The process command: drain the buffer into the accidents table under an
//! ingest run, reporting aggregate counts on completion.

use dtpdb_core::AppConfig;
use dtpdb_pipeline::{run_to_exhaustion, ProcessorConfig};

use crate::fail_run_best_effort;

pub(crate) async fn run_process(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    batch_size: Option<i64>,
) -> anyhow::Result<()> {
    let total = dtpdb_db::count_total(pool).await?;
    let eligible = dtpdb_db::count_eligible(pool).await?;
    tracing::info!(total, eligible, "buffer state at start of run");

    if eligible == 0 {
        println!("buffer is empty — nothing to process");
        return Ok(());
    }

    let run = dtpdb_db::create_ingest_run(pool, "process", "cli").await?;
    if let Err(e) = dtpdb_db::start_ingest_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, "process", format!("{e:#}")).await;
        return Err(e.into());
    }

    let mut processor_config = ProcessorConfig::from_app_config(config);
    if let Some(size) = batch_size {
        anyhow::ensure!(size > 0, "batch size must be positive, got {size}");
        processor_config.batch_size = size;
    }

    match run_to_exhaustion(pool, &processor_config).await {
        Ok(summary) => {
            let committed = i32::try_from(summary.committed).unwrap_or(i32::MAX);
            if let Err(err) = dtpdb_db::complete_ingest_run(pool, run.id, committed).await {
                fail_run_best_effort(pool, run.id, "process", format!("{err:#}")).await;
                return Err(err.into());
            }
            println!(
                "committed {} rows, quarantined {}, left {} for retry; \
                 wrote {} accidents ({} duplicates skipped)",
                summary.committed,
                summary.quarantined,
                summary.skipped,
                summary.records_written,
                summary.records_deduplicated
            );
            Ok(())
        }
        Err(err) => {
            fail_run_best_effort(pool, run.id, "process", format!("{err:#}")).await;
            Err(err.into())
        }
    }
}
