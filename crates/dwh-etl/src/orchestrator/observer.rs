//! Progress hooks
//!
//! The orchestrator reports progress through an [`EtlObserver`]. All methods
//! default to no-ops; the CLI narrates to the terminal through one.

use super::report::{PhaseReport, StageReport, StatementReport};
use super::Stage;
use crate::catalog::{Phase, Statement};
use crate::row::Row;

pub trait EtlObserver: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}

    fn phase_started(&self, _phase: Phase, _subject: Option<&str>) {}

    fn statement_started(&self, _statement: &Statement) {}

    fn statement_finished(&self, _report: &StatementReport) {}

    fn phase_finished(&self, _report: &PhaseReport) {}

    /// A check query returned rows for `table`
    fn duplicates_found(&self, _table: &str, _rows: &[Row]) {}

    fn stage_finished(&self, _report: &StageReport) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EtlObserver for NoopObserver {}

pub(super) static NOOP: NoopObserver = NoopObserver;
