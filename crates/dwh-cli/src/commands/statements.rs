//! `dwh statements` command implementation
//!
//! Prints the resolved statement catalog. Needs the config file but no
//! connection, so it doubles as a check of the `[S3]` and `[IAM_ROLE]` values.

use crate::error::Result;
use colored::Colorize;
use dwh_common::DwhConfig;
use dwh_etl::catalog::{CatalogParams, StatementCatalog};
use dwh_etl::Phase;

pub fn run(config: &DwhConfig, only: Option<Phase>) -> Result<()> {
    let catalog = StatementCatalog::load(&CatalogParams::from_config(config)?)?;
    print!("{}", render(&catalog, only));
    Ok(())
}

/// Catalog as SQL script text, one commented header per statement
pub fn render(catalog: &StatementCatalog, only: Option<Phase>) -> String {
    let mut out = String::new();
    let phases = Phase::ALL.into_iter().filter(|p| only.is_none_or(|o| o == *p));

    for phase in phases {
        out.push_str(&format!("{}\n", format!("-- ==== {} ====", phase).cyan().bold()));
        for statement in catalog.phase(phase) {
            let header = match statement.table() {
                Some(table) => format!("-- {} ({})", statement.name(), table),
                None => format!("-- {}", statement.name()),
            };
            out.push_str(&format!("{}\n{}\n\n", header.dimmed(), statement.sql()));
        }
    }
    out
}
