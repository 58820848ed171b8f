//! Run reports
//!
//! Every phase run yields a [`PhaseReport`], every pipeline stage a
//! [`StageReport`]. Reports serialize to JSON for `--report`.

use super::{FailureMode, Stage};
use crate::catalog::{Phase, StatementId};
use crate::dedup::ArtistCandidate;
use crate::error::EtlError;
use crate::row::Row;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Why a phase or stage issued no statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The guard query did not satisfy its condition
    GuardNotMet,
    /// The confirmation was answered negatively
    Declined,
    /// A stage this one depends on failed
    UpstreamFailed,
    /// The run was cancelled before this was issued
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PhaseStatus {
    Completed,
    Skipped { reason: SkipReason },
    /// `statement` is the guard or the first statement that failed
    Failed { statement: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum StatementOutcome {
    Committed { rows: Vec<Row> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementReport {
    pub statement: StatementId,
    pub table: Option<&'static str>,
    #[serde(flatten)]
    pub outcome: StatementOutcome,
    pub elapsed_ms: u64,
}

impl StatementReport {
    pub fn is_committed(&self) -> bool {
        matches!(self.outcome, StatementOutcome::Committed { .. })
    }

    pub fn rows(&self) -> &[Row] {
        match &self.outcome {
            StatementOutcome::Committed { rows } => rows,
            StatementOutcome::Failed { .. } => &[],
        }
    }
}

/// Result of one phase run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    /// Table or other subject when the phase ran for a single item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(flatten)]
    pub status: PhaseStatus,
    /// Rows returned by the guard query
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guard_rows: Vec<Row>,
    pub statements: Vec<StatementReport>,
    pub elapsed_ms: u64,
}

impl PhaseReport {
    pub(crate) fn new(phase: Phase, subject: Option<String>) -> Self {
        Self {
            phase,
            subject,
            status: PhaseStatus::Completed,
            guard_rows: Vec::new(),
            statements: Vec::new(),
            elapsed_ms: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == PhaseStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, PhaseStatus::Failed { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        self.skip_reason() == Some(SkipReason::Interrupted)
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.status {
            PhaseStatus::Skipped { reason } => Some(reason),
            _ => None,
        }
    }

    /// Number of statements sent to the warehouse, guard excluded
    pub fn statements_issued(&self) -> usize {
        self.statements.len()
    }

    pub fn committed(&self) -> usize {
        self.statements.iter().filter(|s| s.is_committed()).count()
    }

    /// Rows of every committed statement, in order
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.statements.iter().flat_map(|s| s.rows())
    }

    /// The failure as an error, if the phase failed
    pub fn failure(&self) -> Option<EtlError> {
        match &self.status {
            PhaseStatus::Failed { statement, error } => Some(EtlError::StatementExecutionFailed {
                statement: statement.clone(),
                message: error.clone(),
            }),
            _ => None,
        }
    }
}

/// How a duplicate finding was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    Fixed,
    FixFailed,
    /// Reported only; no fix exists for this table
    NoFixDefined,
}

/// Duplicates found by a check query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateFinding {
    pub table: String,
    /// Rows returned by the check query
    pub rows: usize,
    /// Rows the artists fix keeps, one per duplicate group
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub survivors: Vec<ArtistCandidate>,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageOutcome {
    Completed,
    Skipped(SkipReason),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub phases: Vec<PhaseReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<DuplicateFinding>,
}

impl StageReport {
    pub(crate) fn skipped(stage: Stage, reason: SkipReason) -> Self {
        Self {
            stage,
            outcome: StageOutcome::Skipped(reason),
            phases: Vec::new(),
            duplicates: Vec::new(),
        }
    }

    /// Outcome derived from the phases: failed if any failed, interrupted if
    /// any was interrupted, skipped if the only phase was skipped, completed
    /// otherwise.
    pub(crate) fn from_phases(stage: Stage, phases: Vec<PhaseReport>) -> Self {
        let outcome = if phases.iter().any(PhaseReport::is_failed) {
            StageOutcome::Failed
        } else if phases.iter().any(PhaseReport::is_interrupted) {
            StageOutcome::Skipped(SkipReason::Interrupted)
        } else {
            match phases.as_slice() {
                [only] => only
                    .skip_reason()
                    .map_or(StageOutcome::Completed, StageOutcome::Skipped),
                _ => StageOutcome::Completed,
            }
        };

        Self {
            stage,
            outcome,
            phases,
            duplicates: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == StageOutcome::Failed
    }

    /// Failed, interrupted, or skipped because something before it failed
    pub fn is_blocked(&self) -> bool {
        matches!(
            self.outcome,
            StageOutcome::Failed
                | StageOutcome::Skipped(SkipReason::UpstreamFailed | SkipReason::Interrupted)
        )
    }

    pub fn is_interrupted(&self) -> bool {
        self.outcome == StageOutcome::Skipped(SkipReason::Interrupted)
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}

/// Result of [`Orchestrator::run_stages`](super::Orchestrator::run_stages)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: FailureMode,
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    /// No stage failed, was interrupted or was blocked by a failure
    pub fn succeeded(&self) -> bool {
        !self.stages.iter().any(StageReport::is_blocked)
    }

    /// The run was cancelled before every stage finished
    pub fn interrupted(&self) -> bool {
        self.stages.iter().any(StageReport::is_interrupted)
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// The first failed phase as an error
    pub fn first_failure(&self) -> Option<EtlError> {
        self.stages
            .iter()
            .flat_map(|s| &s.phases)
            .find_map(PhaseReport::failure)
    }
}
