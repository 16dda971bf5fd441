//! Centralized error handling for devprobe

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the individual data sources.
///
/// None of these reach the user directly: the probe turns them into
/// unknown fields or an unavailable GPU report.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// I/O errors (file reading, process spawning)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Parsing errors (invalid data format)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// A value the host could not supply
    #[error("Detection error: {0}")]
    Detection(String),

    /// The program is not on PATH.
    #[error("Command '{0}' not found")]
    CommandNotFound(String),

    /// The program ran but exited unsuccessfully.
    #[error("Command '{program}' failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The program did not finish in time and was killed.
    #[error("Command '{program}' timed out after {timeout:?}")]
    CommandTimedOut { program: String, timeout: Duration },
}

impl From<toml::de::Error> for ProbeError {
    fn from(error: toml::de::Error) -> Self {
        ProbeError::Config(error.to_string())
    }
}

/// Type alias for Results in devprobe
pub type Result<T> = std::result::Result<T, ProbeError>;
