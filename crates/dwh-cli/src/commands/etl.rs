//! `dwh etl` command implementation
//!
//! Loads the staging tables from S3 and builds the star schema:
//! (truncate) → copy → insert → clean → dedup → drop staging.

use super::{ensure_succeeded, run_pipeline};
use crate::error::Result;
use crate::report::RunReport;
use crate::session::Session;
use dwh_etl::orchestrator::Stage;

/// Stages for the given flags, in pipeline order
pub fn stages(truncate: bool, keep_staging: bool) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(6);
    if truncate {
        stages.push(Stage::Truncate);
    }
    stages.extend([
        Stage::LoadStaging,
        Stage::InsertStarSchema,
        Stage::CleanYearZero,
        Stage::Deduplicate,
    ]);
    if !keep_staging {
        stages.push(Stage::DropStaging);
    }
    stages
}

pub async fn run(session: &Session, truncate: bool, keep_staging: bool, verbose: bool) -> Result<()> {
    let report = run_pipeline(session, &session.config, &stages(truncate, keep_staging), verbose).await?;

    RunReport::new("etl")
        .with_pipeline(&report)
        .write_to(session.report.as_deref())?;
    ensure_succeeded(&report)
}
