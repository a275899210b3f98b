use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/dtpdb-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &dtpdb_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("store unavailable after {attempts} connection attempts")]
    StoreUnavailable {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("ingest run {id} is not in the expected '{expected_status}' status")]
    InvalidRunTransition {
        id: i64,
        expected_status: &'static str,
    },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Whether this error represents a transient connectivity condition: the
    /// operation may succeed if attempted again, and the data it carried is
    /// not evidence of a bad record.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Sqlx(e) => is_transient_sqlx(e),
            DbError::StoreUnavailable { .. } => true,
            DbError::InvalidRunTransition { .. } | DbError::Migration(_) => false,
        }
    }
}

/// Returns `true` for sqlx errors caused by connectivity rather than data:
/// I/O failures, TLS failures, pool exhaustion, and pool shutdown. Database
/// errors (constraint violations, bad SQL) are never transient.
#[must_use]
pub fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect to a Postgres pool and verify it with a ping, retrying with
/// exponential backoff on failure.
///
/// Attempts up to `policy.max_attempts` connections. Between attempts the
/// call sleeps `base_delay_secs * 2^attempt` seconds (±25% jitter). When all
/// attempts fail the run cannot proceed and [`DbError::StoreUnavailable`]
/// is returned.
///
/// # Errors
///
/// Returns [`DbError::StoreUnavailable`] once every attempt has failed.
pub async fn connect_pool_with_retry(
    database_url: &str,
    config: PoolConfig,
    policy: RetryPolicy,
) -> Result<PgPool, DbError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_err: Option<sqlx::Error> = None;

    for attempt in 0..attempts {
        match connect_pool(database_url, config).await {
            Ok(pool) => match ping(&pool).await {
                Ok(()) => return Ok(pool),
                Err(e) => last_err = Some(e),
            },
            Err(e) => last_err = Some(e),
        }

        if attempt + 1 < attempts {
            let delay = retry::backoff_delay(policy.base_delay_secs, attempt);
            if let Some(err) = &last_err {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "store connection failed — retrying after backoff"
                );
            }
            tokio::time::sleep(delay).await;
        }
    }

    Err(DbError::StoreUnavailable {
        attempts,
        // last_err is always set here: the loop ran at least once.
        source: last_err.unwrap_or(sqlx::Error::PoolClosed),
    })
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // Count applied migrations before running. The _sqlx_migrations table may not
    // exist yet on a fresh database; treat absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_has_sane_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, DEFAULT_MIN_CONNECTIONS);
        assert_eq!(config.acquire_timeout_secs, DEFAULT_ACQUIRE_TIMEOUT_SECS);
    }

    #[test]
    fn pool_timeout_is_transient() {
        assert!(is_transient_sqlx(&sqlx::Error::PoolTimedOut));
        assert!(is_transient_sqlx(&sqlx::Error::PoolClosed));
    }

    #[test]
    fn row_not_found_is_not_transient() {
        assert!(!is_transient_sqlx(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn invalid_transition_is_not_transient() {
        let err = DbError::InvalidRunTransition {
            id: 1,
            expected_status: "queued",
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn store_unavailable_is_transient() {
        let err = DbError::StoreUnavailable {
            attempts: 3,
            source: sqlx::Error::PoolClosed,
        };
        assert!(err.is_transient());
    }
}

pub mod accidents;
pub mod buffer;
pub mod ingest_runs;
pub mod retry;

pub use accidents::{count_accidents, get_accident_by_card_id, insert_accident_if_absent, AccidentRow};
pub use buffer::{
    count_eligible, count_errored, count_total, enqueue, mark_error, mark_processed, select_batch,
    BufferRow,
};
pub use ingest_runs::{
    complete_ingest_run, create_ingest_run, fail_ingest_run, get_ingest_run, list_recent_ingest_runs,
    start_ingest_run, IngestRunRow,
};
pub use retry::{with_retry, RetryPolicy};
