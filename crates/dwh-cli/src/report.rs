//! Run summaries: terminal tables and the `--report` JSON file

use crate::error::{CliError, Result};
use crate::progress::format_elapsed;
use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use dwh_etl::orchestrator::{PipelineReport, SkipReason, StageOutcome, StageReport};
use dwh_etl::provision::{ProvisionedCluster, TeardownReport};
use dwh_etl::Row;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Everything one command produced, as written by `--report`
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub command: &'static str,
    pub written_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned: Option<&'a ProvisionedCluster>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<&'a PipelineReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown: Option<&'a TeardownReport>,
}

impl<'a> RunReport<'a> {
    pub fn new(command: &'static str) -> Self {
        Self {
            command,
            written_at: Utc::now(),
            provisioned: None,
            pipeline: None,
            teardown: None,
        }
    }

    pub fn with_provisioned(mut self, provisioned: &'a ProvisionedCluster) -> Self {
        self.provisioned = Some(provisioned);
        self
    }

    pub fn with_pipeline(mut self, pipeline: &'a PipelineReport) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn with_teardown(mut self, teardown: &'a TeardownReport) -> Self {
        self.teardown = Some(teardown);
        self
    }

    /// Write pretty JSON to `path`, if a path was given.
    pub fn write_to(&self, path: Option<&Path>) -> Result<()> {
        let Some(path) = path else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CliError::report(path.display().to_string(), e.to_string()))?;
        std::fs::write(path, json + "\n")
            .map_err(|e| CliError::report(path.display().to_string(), e.to_string()))?;
        info!(path = %path.display(), command = self.command, "Run report written");
        Ok(())
    }
}

fn outcome_cell(report: &StageReport) -> String {
    match report.outcome {
        StageOutcome::Completed => "completed".to_string(),
        StageOutcome::Failed => "failed".to_string(),
        StageOutcome::Skipped(reason) => format!("skipped ({})", reason_label(reason)),
    }
}

fn reason_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::GuardNotMet => "nothing to do",
        SkipReason::Declined => "declined",
        SkipReason::UpstreamFailed => "upstream failed",
        SkipReason::Interrupted => "interrupted",
    }
}

/// One line per stage: outcome, statements committed and time spent
pub fn stage_table(report: &PipelineReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Stage", "Outcome", "Statements", "Duplicates", "Time"]);

    for stage in &report.stages {
        let committed: usize = stage.phases.iter().map(|p| p.committed()).sum();
        let issued: usize = stage.phases.iter().map(|p| p.statements_issued()).sum();
        let elapsed: u64 = stage.phases.iter().map(|p| p.elapsed_ms).sum();
        let duplicates = if stage.duplicates.is_empty() {
            "-".to_string()
        } else {
            stage
                .duplicates
                .iter()
                .map(|d| d.table.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        table.add_row(vec![
            stage.stage.to_string(),
            outcome_cell(stage),
            format!("{}/{}", committed, issued),
            duplicates,
            format_elapsed(elapsed),
        ]);
    }
    table
}

/// Result rows as a table, header taken from the first row
pub fn rows_table(rows: &[&Row]) -> Option<Table> {
    let first = rows.first()?;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(first.columns());

    for row in rows {
        table.add_row(row.values().iter().map(ToString::to_string));
    }
    Some(table)
}

pub fn print_pipeline_summary(report: &PipelineReport) {
    println!();
    println!("{}", "Summary:".cyan().bold());
    println!("{}", stage_table(report));

    if report.succeeded() {
        println!("{} Run {} finished", "✓".green(), report.run_id);
    } else if report.interrupted() && report.first_failure().is_none() {
        println!("{} Run {} interrupted", "✗".yellow(), report.run_id);
    } else {
        println!("{} Run {} finished with failures", "✗".red(), report.run_id);
    }
}
