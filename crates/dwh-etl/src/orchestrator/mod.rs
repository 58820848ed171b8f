//! ETL Orchestrator
//!
//! Runs catalog phases against a [`Warehouse`], one statement at a time.
//!
//! A phase run goes through three gates in order:
//!
//! 1. **Guard**: a read-only query whose result decides whether the phase
//!    runs at all. A failing guard fails the phase.
//! 2. **Confirmation**: a yes/no question. A decline skips the phase before
//!    any statement is sent.
//! 3. **Statements**: executed in catalog order, each committed on its own.
//!    The first failure aborts the phase; earlier commits stay.
//!
//! Confirmations apply to destructive phases only. A cancelled token stops
//! the run between statements: what is not yet issued reports
//! [`SkipReason::Interrupted`].
//!
//! Stages ([`Stage`]) combine phases into the pipeline
//! drop, create, truncate, copy, insert, clean, dedup, drop-staging, analytics.

mod observer;
mod pipeline;
mod report;


pub use observer::{EtlObserver, NoopObserver};
pub use pipeline::Stage;
pub use report::{
    DuplicateFinding, PhaseReport, PhaseStatus, PipelineReport, Resolution, SkipReason,
    StageOutcome, StageReport, StatementOutcome, StatementReport,
};

use crate::catalog::{Phase, Statement, StatementCatalog};
use crate::confirm::{ConfirmationPolicy, ConfirmationRequest};
use crate::warehouse::Warehouse;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the pipeline does after a stage fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureMode {
    /// Skip every later stage
    #[default]
    FailFast,
    /// Keep going; only stages that depend on the failed one are skipped
    BestEffort,
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureMode::FailFast => write!(f, "fail-fast"),
            FailureMode::BestEffort => write!(f, "best-effort"),
        }
    }
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(FailureMode::FailFast),
            "best-effort" => Ok(FailureMode::BestEffort),
            other => Err(format!("unknown failure mode '{}', expected fail-fast or best-effort", other)),
        }
    }
}

/// When a guard lets its phase run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardCondition {
    RequireRows,
    RequireNoRows,
}

impl GuardCondition {
    fn is_met(self, rows: usize) -> bool {
        match self {
            GuardCondition::RequireRows => rows > 0,
            GuardCondition::RequireNoRows => rows == 0,
        }
    }
}

/// A read-only precondition for a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub statement: Statement,
    pub condition: GuardCondition,
}

impl Guard {
    pub fn new(statement: &Statement, condition: GuardCondition) -> Self {
        Self {
            statement: statement.clone(),
            condition,
        }
    }

    /// Guard on the first statement of `phase`
    pub fn from_catalog(
        catalog: &StatementCatalog,
        phase: Phase,
        condition: GuardCondition,
    ) -> Option<Self> {
        catalog.phase(phase).first().map(|s| Self::new(s, condition))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Drives phases and stages over one warehouse session
pub struct Orchestrator<'a, W> {
    warehouse: W,
    catalog: &'a StatementCatalog,
    confirm: &'a dyn ConfirmationPolicy,
    observer: &'a dyn EtlObserver,
    mode: FailureMode,
    cancel: CancellationToken,
}

impl<'a, W: Warehouse> Orchestrator<'a, W> {
    pub fn new(
        warehouse: W,
        catalog: &'a StatementCatalog,
        confirm: &'a dyn ConfirmationPolicy,
    ) -> Self {
        Self {
            warehouse,
            catalog,
            confirm,
            observer: &observer::NOOP,
            mode: FailureMode::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn EtlObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_mode(mut self, mode: FailureMode) -> Self {
        self.mode = mode;
        self
    }

    /// Stop between statements once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn mode(&self) -> FailureMode {
        self.mode
    }

    pub fn catalog(&self) -> &'a StatementCatalog {
        self.catalog
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    /// Give the session back, e.g. to close it
    pub fn into_warehouse(self) -> W {
        self.warehouse
    }

    /// Run every statement of `phase` behind an optional guard and confirmation.
    pub async fn run_phase(
        &mut self,
        phase: Phase,
        guard: Option<&Guard>,
        confirmation: Option<&ConfirmationRequest>,
    ) -> PhaseReport {
        let catalog = self.catalog;
        let statements = catalog.phase(phase);
        self.execute_phase(phase, None, statements, guard, confirmation)
            .await
    }

    /// Phase run over a subset of its statements, e.g. a single table.
    pub(crate) async fn execute_phase(
        &mut self,
        phase: Phase,
        subject: Option<String>,
        statements: &[Statement],
        guard: Option<&Guard>,
        confirmation: Option<&ConfirmationRequest>,
    ) -> PhaseReport {
        let started = Instant::now();
        self.observer.phase_started(phase, subject.as_deref());
        let mut report = PhaseReport::new(phase, subject);

        if self.is_cancelled() {
            return self.interrupt_phase(report, started);
        }

        if let Some(guard) = guard {
            match self.warehouse.execute(&guard.statement).await {
                Ok(rows) => {
                    let met = guard.condition.is_met(rows.len());
                    debug!(phase = %phase, guard = %guard.statement.id(), rows = rows.len(), met, "Guard evaluated");
                    report.guard_rows = rows;
                    if !met {
                        info!(phase = %phase, "Guard not met, skipping phase");
                        report.status = PhaseStatus::Skipped {
                            reason: SkipReason::GuardNotMet,
                        };
                        return self.finish_phase(report, started);
                    }
                }
                Err(e) => {
                    warn!(phase = %phase, guard = %guard.statement.id(), error = %e, "Guard failed");
                    report.status = PhaseStatus::Failed {
                        statement: guard.statement.id().to_string(),
                        error: e.to_string(),
                    };
                    return self.finish_phase(report, started);
                }
            }
        }

        let confirmation = match confirmation {
            Some(request) if !phase.is_destructive() => {
                debug!(phase = %phase, subject = %request.subject, "Phase is not destructive, no confirmation needed");
                None
            }
            other => other,
        };

        if let Some(request) = confirmation {
            if !self.confirm.confirm(request) {
                info!(phase = %phase, subject = %request.subject, "Confirmation declined, skipping phase");
                report.status = PhaseStatus::Skipped {
                    reason: SkipReason::Declined,
                };
                return self.finish_phase(report, started);
            }
        }

        for statement in statements {
            if self.is_cancelled() {
                return self.interrupt_phase(report, started);
            }

            self.observer.statement_started(statement);
            let statement_started = Instant::now();
            let result = self.warehouse.execute(statement).await;

            let outcome = match result {
                Ok(rows) => {
                    debug!(statement = %statement.id(), rows = rows.len(), "Statement committed");
                    StatementOutcome::Committed { rows }
                }
                Err(e) => {
                    warn!(statement = %statement.id(), error = %e, "Statement failed, aborting phase");
                    report.status = PhaseStatus::Failed {
                        statement: statement.id().to_string(),
                        error: e.to_string(),
                    };
                    StatementOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };

            let statement_report = StatementReport {
                statement: statement.id(),
                table: statement.table(),
                outcome,
                elapsed_ms: elapsed_ms(statement_started),
            };
            self.observer.statement_finished(&statement_report);
            let failed = !statement_report.is_committed();
            report.statements.push(statement_report);
            if failed {
                break;
            }
        }

        self.finish_phase(report, started)
    }

    fn interrupt_phase(&self, mut report: PhaseReport, started: Instant) -> PhaseReport {
        warn!(
            phase = %report.phase,
            committed = report.committed(),
            "Run cancelled, remaining statements not issued"
        );
        report.status = PhaseStatus::Skipped {
            reason: SkipReason::Interrupted,
        };
        self.finish_phase(report, started)
    }

    fn finish_phase(&self, mut report: PhaseReport, started: Instant) -> PhaseReport {
        report.elapsed_ms = elapsed_ms(started);
        info!(
            phase = %report.phase,
            subject = report.subject.as_deref(),
            status = ?report.status,
            statements = report.statements_issued(),
            elapsed_ms = report.elapsed_ms,
            "Phase finished"
        );
        self.observer.phase_finished(&report);
        report
    }
}
