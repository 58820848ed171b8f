//! Sparkify DWH Common Library
//!
//! Shared configuration, error handling and logging for the DWH workspace.
//!
//! - **Configuration**: the `dwh.cfg` INI file, environment overrides and the
//!   provisioning write-back of the cluster endpoint and role ARN
//! - **Error Handling**: [`DwhError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use dwh_common::{DwhConfig, Result};
//!
//! fn database_name() -> Result<String> {
//!     let config = DwhConfig::load("dwh.cfg")?;
//!     Ok(config.require("CLUSTER", "DB_NAME")?.to_string())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::DwhConfig;
pub use error::{DwhError, Result};
