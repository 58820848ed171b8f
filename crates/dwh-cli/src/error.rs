//! Error types for the DWH CLI
//!
//! Every variant is user-facing: the message says what went wrong and what
//! to try next.

use dwh_common::DwhError;
use dwh_etl::EtlError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file missing, unreadable or incomplete
    #[error("Configuration error: {0}")]
    Config(#[from] DwhError),

    /// Provisioning, connection or catalog failure
    #[error("{0}")]
    Etl(#[from] EtlError),

    /// At least one stage failed
    #[error("ETL pipeline failed: {0}. Re-run with --mode best-effort to continue past failures, or pass --report <file> for details.")]
    PipelineFailed(String),

    /// Ctrl-C during a cluster wait or between statements
    #[error("Interrupted while {0}. Work already committed stays; re-run the command to pick up from there.")]
    Interrupted(String),

    /// Writing the run report failed
    #[error("Failed to write report '{path}': {message}. Check the directory exists and is writable.")]
    Report { path: String, message: String },
}

impl CliError {
    pub fn report(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Report {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Map cancellation to [`CliError::Interrupted`], keep everything else.
    pub fn from_etl(err: EtlError) -> Self {
        match err {
            EtlError::Cancelled(what) => Self::Interrupted(what),
            other => Self::Etl(other),
        }
    }
}
