//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function. Commands that
//! talk to the warehouse go through [`run_pipeline`].

pub mod analytics;
pub mod create_tables;
pub mod etl;
pub mod provision;
pub mod statements;
pub mod teardown;

use crate::error::{CliError, Result};
use crate::narrate::ConsoleNarrator;
use crate::progress::create_spinner;
use crate::report::print_pipeline_summary;
use crate::session::Session;
use dwh_common::DwhConfig;
use dwh_etl::catalog::{CatalogParams, StatementCatalog};
use dwh_etl::orchestrator::{Orchestrator, PipelineReport, Stage};
use dwh_etl::warehouse::{ConnectionSettings, PgWarehouse, Warehouse};
use tracing::warn;

/// Resolve the catalog from `config`, connect and run `stages`.
///
/// The connection is closed before returning, whatever the outcome of the
/// stages. A failed stage is not an error here; see [`ensure_succeeded`].
pub async fn run_pipeline(
    session: &Session,
    config: &DwhConfig,
    stages: &[Stage],
    verbose: bool,
) -> Result<PipelineReport> {
    let catalog = StatementCatalog::load(&CatalogParams::from_config(config)?)?;
    let settings = ConnectionSettings::from_config(config)?;

    let spinner = create_spinner(&format!("Connecting to {}:{}...", settings.host, settings.port));
    let connected = PgWarehouse::connect(&settings).await;
    spinner.finish_and_clear();
    let warehouse = connected?;

    let narrator = ConsoleNarrator::new(verbose);
    let mut orchestrator = Orchestrator::new(warehouse, &catalog, session.confirm())
        .with_observer(&narrator)
        .with_mode(session.mode)
        .with_cancellation(session.cancel.clone());
    let report = orchestrator.run_stages(stages).await;

    if let Err(e) = orchestrator.into_warehouse().close().await {
        warn!(error = %e, "Failed to close warehouse connection");
    }

    print_pipeline_summary(&report);
    Ok(report)
}

/// Turn a pipeline with failed stages into [`CliError::PipelineFailed`],
/// and an interrupted one into [`CliError::Interrupted`].
pub fn ensure_succeeded(report: &PipelineReport) -> Result<()> {
    if report.succeeded() {
        return Ok(());
    }
    if report.interrupted() && report.first_failure().is_none() {
        return Err(CliError::Interrupted(format!("running the pipeline (run {})", report.run_id)));
    }
    let detail = report
        .first_failure()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "a stage failed".to_string());
    Err(CliError::PipelineFailed(detail))
}
