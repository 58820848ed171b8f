//! Terminal narration of a pipeline run

use crate::progress::format_elapsed;
use colored::Colorize;
use dwh_etl::orchestrator::{
    EtlObserver, PhaseReport, SkipReason, Stage, StatementOutcome, StatementReport,
};
use dwh_etl::{Phase, Row, Statement};

/// Prints one line per statement and per skipped phase to stdout.
///
/// With `verbose`, the SQL of each statement is echoed before it runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNarrator {
    verbose: bool,
}

impl ConsoleNarrator {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

fn action(phase: Phase) -> Option<&'static str> {
    match phase {
        Phase::DropTables | Phase::DropStagingTables => Some("dropped"),
        Phase::CreateTables => Some("created"),
        Phase::CopyStaging => Some("loaded from S3"),
        Phase::InsertStarSchema => Some("filled"),
        Phase::CleanYearZero => Some("cleaned"),
        Phase::TruncateTables => Some("truncated"),
        Phase::CheckDuplicates => Some("checked for duplicates"),
        _ => None,
    }
}

/// `staging_events created`, or the statement name when there is no table
pub fn describe(report: &StatementReport) -> String {
    match (report.table, action(report.statement.phase)) {
        (Some(table), Some(action)) => format!("{} {}", table, action),
        _ => report.statement.name.to_string(),
    }
}

fn skip_text(phase: Phase, reason: SkipReason) -> &'static str {
    match (phase, reason) {
        (Phase::DropTables, SkipReason::GuardNotMet) => "no existing tables",
        (Phase::CleanYearZero, SkipReason::GuardNotMet) => "no songs with year 0",
        (_, SkipReason::GuardNotMet) => "precondition not met",
        (_, SkipReason::Declined) => "declined",
        (_, SkipReason::UpstreamFailed) => "an earlier stage failed",
        (_, SkipReason::Interrupted) => "interrupted",
    }
}

impl EtlObserver for ConsoleNarrator {
    fn stage_started(&self, stage: Stage) {
        println!();
        println!("{} {}", "==>".cyan().bold(), stage.as_str().bold());
    }

    fn statement_started(&self, statement: &Statement) {
        if self.verbose {
            for line in statement.sql().lines() {
                println!("    {}", line.dimmed());
            }
        }
    }

    fn statement_finished(&self, report: &StatementReport) {
        let elapsed = format_elapsed(report.elapsed_ms).dimmed();
        match &report.outcome {
            StatementOutcome::Committed { .. } => {
                println!("  {} {} {}", "✓".green(), describe(report), elapsed);
            }
            StatementOutcome::Failed { error } => {
                println!("  {} {} {}", "✗".red(), describe(report), elapsed);
                println!("    {}", error.red());
            }
        }
    }

    fn phase_finished(&self, report: &PhaseReport) {
        let label = report
            .subject
            .clone()
            .unwrap_or_else(|| report.phase.to_string());

        if let Some(reason) = report.skip_reason() {
            println!(
                "  {} {} skipped: {}",
                "-".yellow(),
                label,
                skip_text(report.phase, reason)
            );
        } else if report.is_failed() && report.statements.is_empty() {
            // the guard itself failed
            if let Some(err) = report.failure() {
                println!("  {} {}: {}", "✗".red(), label, err.to_string().red());
            }
        }
    }

    fn duplicates_found(&self, table: &str, rows: &[Row]) {
        println!(
            "  {} {} duplicate row(s) in '{}'",
            "!".yellow().bold(),
            rows.len(),
            table
        );
        for row in rows.iter().take(5) {
            println!("      {}", row);
        }
    }
}
