//! `dwh analytics` command implementation
//!
//! Runs the analytic queries and prints each result as a table.

use super::{ensure_succeeded, run_pipeline};
use crate::error::Result;
use crate::report::{rows_table, RunReport};
use crate::session::Session;
use colored::Colorize;
use dwh_etl::orchestrator::Stage;
use dwh_etl::Row;

pub async fn run(session: &Session, verbose: bool) -> Result<()> {
    let report = run_pipeline(session, &session.config, &[Stage::Analytics], verbose).await?;

    let statements = report
        .stage(Stage::Analytics)
        .into_iter()
        .flat_map(|stage| &stage.phases)
        .flat_map(|phase| &phase.statements)
        .filter(|statement| statement.is_committed());

    for statement in statements {
        println!();
        println!("{}", statement.statement.name.cyan().bold());
        let rows: Vec<&Row> = statement.rows().iter().collect();
        match rows_table(&rows) {
            Some(table) => println!("{}", table),
            None => println!("  (no rows)"),
        }
    }

    RunReport::new("analytics")
        .with_pipeline(&report)
        .write_to(session.report.as_deref())?;
    ensure_succeeded(&report)
}
