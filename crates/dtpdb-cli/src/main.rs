use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod fetch;
mod process;
mod status;

#[derive(Debug, Parser)]
#[command(name = "dtpdb")]
#[command(about = "Road-accident statistics ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download accident cards for the monitored localities into the buffer
    Fetch {
        /// First year of the window (defaults to the trailing six months)
        #[arg(long)]
        start_year: Option<i32>,
        /// First month of the window (1-12)
        #[arg(long)]
        start_month: Option<u32>,
        /// Last year of the window
        #[arg(long)]
        end_year: Option<i32>,
        /// Last month of the window (1-12)
        #[arg(long)]
        end_month: Option<u32>,
    },
    /// Normalize buffered payloads into the accidents table
    Process {
        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<i64>,
    },
    /// Apply pending database migrations
    Migrate,
    /// Show buffer counts and recent ingest runs
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = dtpdb_core::load_app_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let cli = Cli::parse();

    let pool_config = dtpdb_db::PoolConfig::from_app_config(&config);
    let connect_retry = dtpdb_db::RetryPolicy {
        max_attempts: config.db_connect_max_attempts,
        base_delay_secs: config.db_connect_backoff_base_secs,
    };
    let pool =
        dtpdb_db::connect_pool_with_retry(&config.database_url, pool_config, connect_retry).await?;

    match cli.command {
        Commands::Fetch {
            start_year,
            start_month,
            end_year,
            end_month,
        } => {
            let today = chrono::Local::now().date_naive();
            let window = dtpdb_core::MonthWindow::resolve(
                start_year,
                start_month,
                end_year,
                end_month,
                today,
            )?;
            fetch::run_fetch(&pool, &config, window).await
        }
        Commands::Process { batch_size } => process::run_process(&pool, &config, batch_size).await,
        Commands::Migrate => {
            let applied = dtpdb_db::run_migrations(&pool).await?;
            println!("applied {applied} migrations");
            Ok(())
        }
        Commands::Status => status::run_status(&pool).await,
    }
}

/// Attempt to mark an ingest run as failed, logging any secondary error.
pub(crate) async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    context: &'static str,
    message: String,
) {
    if let Err(mark_err) = dtpdb_db::fail_ingest_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark {context} run as failed"
        );
    }
}
