//! Warehouse Gateway
//!
//! The orchestrator talks to the warehouse through [`Warehouse`]: one
//! exclusive session, statements issued one at a time, each committed before
//! the next is sent.

mod postgres;

pub use postgres::{ConnectionSettings, PgWarehouse};

use crate::catalog::Statement;
use crate::row::Row;
use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a warehouse session
#[derive(Error, Debug)]
pub enum WarehouseError {
    /// SQL, protocol or connection error from the driver
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),

    /// Connecting did not finish in time
    #[error("connection attempt timed out after {0}s")]
    ConnectTimeout(u64),
}

/// A single exclusive warehouse session
#[async_trait]
pub trait Warehouse: Send {
    /// Execute one statement in its own transaction and commit it.
    ///
    /// Returns the result rows, empty for statements that produce none.
    async fn execute(&mut self, statement: &Statement) -> Result<Vec<Row>, WarehouseError>;

    /// End the session.
    async fn close(self) -> Result<(), WarehouseError>
    where
        Self: Sized;
}
