//! Supervisor error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("config error: {0}")]
    Config(#[from] linkwatch_config::ConfigLoadError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
