//! Sparkify DWH ETL Library
//!
//! Provisions the Redshift cluster, loads the song and log data sets into
//! staging tables and transforms them into the songplays star schema.
//!
//! # Overview
//!
//! - **Statement Catalog** ([`catalog`]): every SQL statement, grouped by
//!   [`Phase`] and resolved once from configuration
//! - **Orchestrator** ([`orchestrator`]): runs phases in pipeline order with
//!   guards, confirmations and per-statement commits
//! - **Confirmation** ([`confirm`]): injected yes/no policies for destructive steps
//! - **Warehouse** ([`warehouse`]): the SQL gateway and its Postgres-wire implementation
//! - **Infrastructure** ([`infra`], [`provision`]): IAM role and cluster lifecycle
//!
//! # Example
//!
//! ```no_run
//! use dwh_common::DwhConfig;
//! use dwh_etl::catalog::{CatalogParams, StatementCatalog};
//! use dwh_etl::confirm::AlwaysNo;
//! use dwh_etl::orchestrator::{Orchestrator, Stage};
//! use dwh_etl::warehouse::{ConnectionSettings, PgWarehouse};
//!
//! # async fn run() -> dwh_etl::Result<()> {
//! let config = DwhConfig::load("dwh.cfg")?;
//! let catalog = StatementCatalog::load(&CatalogParams::from_config(&config)?)?;
//! let warehouse = PgWarehouse::connect(&ConnectionSettings::from_config(&config)?).await?;
//!
//! let mut orchestrator = Orchestrator::new(warehouse, &catalog, &AlwaysNo);
//! let report = orchestrator
//!     .run_stages(&[Stage::LoadStaging, Stage::InsertStarSchema])
//!     .await;
//! assert!(report.succeeded());
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod catalog;
pub mod confirm;
pub mod dedup;
pub mod error;
pub mod infra;
pub mod orchestrator;
pub mod provision;
pub mod row;
pub mod warehouse;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use catalog::{Phase, Statement, StatementCatalog, StatementId};
pub use error::{EtlError, Result};
pub use row::{Row, Value};
