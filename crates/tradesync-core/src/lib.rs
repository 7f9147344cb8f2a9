use thiserror::Error;

mod app_config;
pub mod chunk;
pub mod config;
pub mod record;
pub mod sheets;

pub use app_config::{AppConfig, Environment, SheetIds};
pub use config::{load_app_config, load_app_config_from_env};
pub use record::{EntityKind, RecordKey, SourceRow, DELETION_MARKER};
pub use sheets::{SheetPair, SheetTarget};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
