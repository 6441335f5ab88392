//! # Streaming Error Types
//!
//! Only configuration and setup errors are fatal. Everything raised while
//! streaming is logged and counted by the scheduler instead.

use thiserror::Error;

use horizon_core::{PoolError, TaskError};

/// Errors that can occur in the streaming system.
#[derive(Error, Debug)]
pub enum StreamingError {
    /// Render slot pool failure.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Worker pool could not start.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text is not valid TOML for `StreamingConfig`.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for streaming operations.
pub type StreamingResult<T> = Result<T, StreamingError>;
