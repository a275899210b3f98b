use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    pub localities_path: PathBuf,
    pub failed_records_path: PathBuf,

    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub db_connect_max_attempts: u32,
    pub db_connect_backoff_base_secs: u64,

    pub api_base_url: String,
    pub fetch_timeout_secs: u64,
    pub fetch_user_agent: String,
    pub fetch_pause_ms: u64,
    pub enqueue_max_attempts: u32,
    pub enqueue_backoff_base_secs: u64,

    pub batch_size: i64,
    pub record_pause_ms: u64,
    pub batch_pause_ms: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("log_level", &self.log_level)
            .field("localities_path", &self.localities_path)
            .field("failed_records_path", &self.failed_records_path)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("db_connect_max_attempts", &self.db_connect_max_attempts)
            .field(
                "db_connect_backoff_base_secs",
                &self.db_connect_backoff_base_secs,
            )
            .field("api_base_url", &self.api_base_url)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("fetch_user_agent", &self.fetch_user_agent)
            .field("fetch_pause_ms", &self.fetch_pause_ms)
            .field("enqueue_max_attempts", &self.enqueue_max_attempts)
            .field(
                "enqueue_backoff_base_secs",
                &self.enqueue_backoff_base_secs,
            )
            .field("batch_size", &self.batch_size)
            .field("record_pause_ms", &self.record_pause_ms)
            .field("batch_pause_ms", &self.batch_pause_ms)
            .finish()
    }
}
