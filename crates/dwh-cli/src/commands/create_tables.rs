//! `dwh create-tables` command implementation
//!
//! Drops whatever tables exist and creates the staging and star schema tables.

use super::{ensure_succeeded, run_pipeline};
use crate::error::Result;
use crate::report::RunReport;
use crate::session::Session;
use dwh_etl::orchestrator::Stage;

pub const STAGES: [Stage; 2] = [Stage::DropExisting, Stage::CreateTables];

pub async fn run(session: &Session, verbose: bool) -> Result<()> {
    let report = run_pipeline(session, &session.config, &STAGES, verbose).await?;

    RunReport::new("create-tables")
        .with_pipeline(&report)
        .write_to(session.report.as_deref())?;
    ensure_succeeded(&report)
}
