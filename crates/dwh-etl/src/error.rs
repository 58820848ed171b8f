//! Error types for the ETL core
//!
//! A declined confirmation is not an error: it surfaces as
//! [`SkipReason::Declined`](crate::orchestrator::SkipReason) in a phase report.

use crate::infra::InfraError;
use crate::warehouse::WarehouseError;
use dwh_common::DwhError;
use thiserror::Error;

/// Result type alias for ETL operations
pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    /// Required configuration absent, empty or malformed; raised before any remote call
    #[error(transparent)]
    Config(#[from] DwhError),

    /// Cluster or role creation, polling or deletion failed
    #[error("Infrastructure operation '{operation}' failed: {message}")]
    InfrastructureOperationFailed { operation: String, message: String },

    /// A SQL statement failed outside of a phase run
    #[error("Statement '{statement}' failed: {message}")]
    StatementExecutionFailed { statement: String, message: String },

    /// Connecting to or closing the warehouse failed
    #[error("Warehouse connection error: {0}. Check HOST, DB_PORT and the credentials in [CLUSTER].")]
    Warehouse(#[from] WarehouseError),

    /// A statement template references a parameter that is not defined
    #[error("Statement template '{statement}' references unknown parameter '{parameter}'")]
    Template { statement: String, parameter: String },

    /// A wait was interrupted through its cancellation token
    #[error("Cancelled while {0}")]
    Cancelled(String),
}

impl EtlError {
    pub fn infrastructure(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InfrastructureOperationFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl From<InfraError> for EtlError {
    fn from(err: InfraError) -> Self {
        Self::InfrastructureOperationFailed {
            operation: err.operation.to_string(),
            message: err.message,
        }
    }
}
