//! Sparkify DWH CLI Library
//!
//! Command-line interface for the Sparkify Redshift data warehouse.
//!
//! # Overview
//!
//! - **Provisioning**: IAM role, cluster, config write-back and tables (`dwh provision`)
//! - **Schema**: drop and recreate every table (`dwh create-tables`)
//! - **ETL**: copy, insert, clean, deduplicate, drop staging (`dwh etl`)
//! - **Analytics**: run the analytic queries (`dwh analytics`)
//! - **Teardown**: delete the cluster and the role (`dwh teardown`)
//! - **Catalog**: print the resolved SQL without connecting (`dwh statements`)

pub mod commands;
pub mod error;
pub mod narrate;
pub mod progress;
pub mod report;
pub mod session;

// Re-export commonly used types
pub use error::{CliError, Result};
pub use session::Session;

use clap::{Parser, Subcommand};
use dwh_etl::orchestrator::FailureMode;
use dwh_etl::Phase;
use std::path::PathBuf;

/// DWH - Sparkify Redshift warehouse provisioning and ETL
#[derive(Parser, Debug)]
#[command(name = "dwh")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file
    #[arg(long, env = "DWH_CONFIG", default_value = dwh_common::config::DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true, conflicts_with = "no_input")]
    pub yes: bool,

    /// Answer no to every confirmation without prompting
    #[arg(long, global = true)]
    pub no_input: bool,

    /// What to do after a stage fails (fail-fast, best-effort)
    #[arg(long, default_value = "fail-fast", global = true)]
    pub mode: FailureMode,

    /// Write a JSON run report to this file
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the command-line help as Markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the IAM role and the cluster, write the endpoint back and create the tables
    Provision {
        /// Stop after the config write-back; do not touch tables
        #[arg(long)]
        skip_tables: bool,

        /// Give up waiting for the cluster after this many seconds
        #[arg(long, default_value = "1200")]
        timeout: u64,
    },

    /// Drop existing tables and create the schema
    CreateTables,

    /// Load staging tables and build the star schema
    Etl {
        /// Truncate tables before loading, asking per table
        #[arg(long)]
        truncate: bool,

        /// Keep the staging tables after loading
        #[arg(long)]
        keep_staging: bool,
    },

    /// Run the analytic queries
    Analytics,

    /// Delete the cluster and the IAM role
    Teardown {
        /// Give up waiting for the deletion after this many seconds
        #[arg(long, default_value = "1200")]
        timeout: u64,
    },

    /// Print the resolved statement catalog without connecting
    Statements {
        /// Only this phase (e.g. copy-staging)
        #[arg(short, long)]
        phase: Option<Phase>,
    },
}
