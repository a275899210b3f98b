use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod localities;
pub mod records;
pub mod window;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use localities::{load_localities, LocalitiesFile, Locality};
pub use records::{NormalizedAccident, Provenance};
pub use window::MonthWindow;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read localities file {path}: {source}")]
    LocalitiesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse localities file: {0}")]
    LocalitiesFileParse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}
