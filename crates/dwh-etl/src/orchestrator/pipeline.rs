//! Pipeline stages

use super::report::{
    DuplicateFinding, PhaseReport, PipelineReport, Resolution, SkipReason, StageReport,
};
use super::{FailureMode, Guard, GuardCondition, Orchestrator};
use crate::catalog::Phase;
use crate::confirm::ConfirmationRequest;
use crate::dedup::{self, ArtistCandidate};
use crate::row::Row;
use crate::warehouse::Warehouse;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Table whose duplicates have a fix
const DEDUP_TABLE: &str = "artists";

/// A pipeline step, declared in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Drop the tables the catalog scan finds
    DropExisting,
    CreateTables,
    /// Truncate tables one by one, each after confirmation
    Truncate,
    LoadStaging,
    InsertStarSchema,
    /// Set `year = 0` to NULL in songs, after confirmation
    CleanYearZero,
    /// Check every star table; fix artists
    Deduplicate,
    /// Drop both staging tables, after confirmation
    DropStaging,
    Analytics,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::DropExisting,
        Stage::CreateTables,
        Stage::Truncate,
        Stage::LoadStaging,
        Stage::InsertStarSchema,
        Stage::CleanYearZero,
        Stage::Deduplicate,
        Stage::DropStaging,
        Stage::Analytics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::DropExisting => "drop-existing",
            Stage::CreateTables => "create-tables",
            Stage::Truncate => "truncate",
            Stage::LoadStaging => "load-staging",
            Stage::InsertStarSchema => "insert-star-schema",
            Stage::CleanYearZero => "clean-year-zero",
            Stage::Deduplicate => "deduplicate",
            Stage::DropStaging => "drop-staging",
            Stage::Analytics => "analytics",
        }
    }

    /// Stages that must not run when the stage before them failed
    pub fn requires_previous(self) -> bool {
        matches!(
            self,
            Stage::InsertStarSchema | Stage::CleanYearZero | Stage::Deduplicate
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}

impl<W: Warehouse> Orchestrator<'_, W> {
    /// Run `stages` in pipeline order, whatever order they are given in.
    pub async fn run_stages(&mut self, stages: &[Stage]) -> PipelineReport {
        let mut ordered = stages.to_vec();
        ordered.sort();
        ordered.dedup();

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, mode = %self.mode, stages = ordered.len(), "Pipeline started");

        let mut reports: Vec<StageReport> = Vec::with_capacity(ordered.len());
        for stage in ordered {
            if self.is_cancelled() {
                warn!(stage = %stage, "Skipping stage, run cancelled");
                let report = StageReport::skipped(stage, SkipReason::Interrupted);
                self.observer.stage_finished(&report);
                reports.push(report);
                continue;
            }

            let upstream_failed = match self.mode {
                FailureMode::FailFast => reports.iter().any(StageReport::is_blocked),
                FailureMode::BestEffort => {
                    stage.requires_previous()
                        && reports.last().is_some_and(StageReport::is_blocked)
                }
            };

            let report = if upstream_failed {
                warn!(stage = %stage, "Skipping stage, an earlier stage failed");
                StageReport::skipped(stage, SkipReason::UpstreamFailed)
            } else {
                self.observer.stage_started(stage);
                self.run_stage(stage)
                    .instrument(info_span!("stage", stage = %stage))
                    .await
            };

            info!(stage = %stage, outcome = ?report.outcome, "Stage finished");
            self.observer.stage_finished(&report);
            reports.push(report);
        }

        let report = PipelineReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            mode: self.mode,
            stages: reports,
        };
        info!(%run_id, succeeded = report.succeeded(), interrupted = report.interrupted(), "Pipeline finished");
        report
    }

    async fn run_stage(&mut self, stage: Stage) -> StageReport {
        match stage {
            Stage::DropExisting => {
                let guard = Guard::from_catalog(
                    self.catalog,
                    Phase::ExistingTables,
                    GuardCondition::RequireRows,
                );
                let report = self.run_phase(Phase::DropTables, guard.as_ref(), None).await;
                StageReport::from_phases(stage, vec![report])
            }
            Stage::CreateTables => self.single_phase(stage, Phase::CreateTables).await,
            Stage::Truncate => self.truncate_tables().await,
            Stage::LoadStaging => self.single_phase(stage, Phase::CopyStaging).await,
            Stage::InsertStarSchema => self.single_phase(stage, Phase::InsertStarSchema).await,
            Stage::CleanYearZero => {
                let guard = Guard::from_catalog(
                    self.catalog,
                    Phase::DetectYearZero,
                    GuardCondition::RequireRows,
                );
                let request = ConfirmationRequest::new(
                    "songs",
                    "In the 'songs' table there are records with 'year' = 0.\n\
                     Should those fields be set to NULL?",
                );
                let report = self
                    .run_phase(Phase::CleanYearZero, guard.as_ref(), Some(&request))
                    .await;
                StageReport::from_phases(stage, vec![report])
            }
            Stage::Deduplicate => self.deduplicate().await,
            Stage::DropStaging => {
                let request = ConfirmationRequest::new(
                    "staging_events, staging_songs",
                    "Do you want to drop both staging tables?",
                );
                let report = self
                    .run_phase(Phase::DropStagingTables, None, Some(&request))
                    .await;
                StageReport::from_phases(stage, vec![report])
            }
            Stage::Analytics => self.single_phase(stage, Phase::Analytics).await,
        }
    }

    async fn single_phase(&mut self, stage: Stage, phase: Phase) -> StageReport {
        let report = self.run_phase(phase, None, None).await;
        StageReport::from_phases(stage, vec![report])
    }

    async fn truncate_tables(&mut self) -> StageReport {
        let catalog = self.catalog;
        let mut phases = Vec::new();

        for statement in catalog.phase(Phase::TruncateTables) {
            let table = statement.table().unwrap_or(statement.name());
            let request = ConfirmationRequest::new(
                table,
                format!("Do you want to truncate table '{}'?", table),
            );
            let report = self
                .execute_phase(
                    Phase::TruncateTables,
                    Some(table.to_string()),
                    std::slice::from_ref(statement),
                    None,
                    Some(&request),
                )
                .await;

            let stop = report.is_failed() || report.is_interrupted();
            phases.push(report);
            if stop {
                break;
            }
        }

        StageReport::from_phases(Stage::Truncate, phases)
    }

    /// Check every star table for duplicates and fix the artists table.
    async fn deduplicate(&mut self) -> StageReport {
        let catalog = self.catalog;
        let mut phases: Vec<PhaseReport> = Vec::new();
        let mut findings = Vec::new();

        for check in catalog.phase(Phase::CheckDuplicates) {
            let table = check.table().unwrap_or(check.name());
            let report = self
                .execute_phase(
                    Phase::CheckDuplicates,
                    Some(table.to_string()),
                    std::slice::from_ref(check),
                    None,
                    None,
                )
                .await;

            if report.is_failed() || report.is_interrupted() {
                phases.push(report);
                break;
            }

            let rows: Vec<Row> = report.rows().cloned().collect();
            phases.push(report);
            if rows.is_empty() {
                info!(table, "No duplicates");
                continue;
            }

            self.observer.duplicates_found(table, &rows);
            if table != DEDUP_TABLE {
                warn!(table, rows = rows.len(), "Duplicates found, no fix defined for this table");
                findings.push(DuplicateFinding {
                    table: table.to_string(),
                    rows: rows.len(),
                    survivors: Vec::new(),
                    resolution: Resolution::NoFixDefined,
                });
                continue;
            }

            let candidates: Vec<ArtistCandidate> =
                rows.iter().filter_map(ArtistCandidate::from_row).collect();
            let survivors = dedup::select_survivors(&candidates);
            info!(table, groups = survivors.len(), "Removing duplicates");

            let fix = self
                .run_phase(Phase::RemoveArtistDuplicates, None, None)
                .await;
            let resolution = if fix.is_completed() {
                Resolution::Fixed
            } else {
                Resolution::FixFailed
            };
            let fix_failed = fix.is_failed() || fix.is_interrupted();
            phases.push(fix);
            findings.push(DuplicateFinding {
                table: table.to_string(),
                rows: rows.len(),
                survivors,
                resolution,
            });
            if fix_failed {
                break;
            }
        }

        let mut report = StageReport::from_phases(Stage::Deduplicate, phases);
        report.duplicates = findings;
        report
    }
}
