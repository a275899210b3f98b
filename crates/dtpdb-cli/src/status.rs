//! The status command: read-only visibility into the buffer and recent runs.

use chrono::{DateTime, Utc};

pub(crate) async fn run_status(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let total = dtpdb_db::count_total(pool).await?;
    let eligible = dtpdb_db::count_eligible(pool).await?;
    let errored = dtpdb_db::count_errored(pool).await?;
    let accidents = dtpdb_db::count_accidents(pool).await?;

    println!("buffer: {total} rows ({eligible} eligible, {errored} quarantined)");
    println!("accidents: {accidents} normalized records");
    println!();

    let runs = dtpdb_db::list_recent_ingest_runs(pool, 10).await?;
    if runs.is_empty() {
        println!("no ingest runs recorded yet");
        return Ok(());
    }

    println!("| started | type | status | records |");
    println!("|---------|------|--------|---------|");
    for run in &runs {
        let started = fmt_timestamp(run.started_at);
        println!(
            "| {started} | {} | {} | {} |",
            run.run_type, run.status, run.records_processed
        );
    }

    Ok(())
}

/// Format an optional timestamp for display, returning `"—"` when `None`.
fn fmt_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
