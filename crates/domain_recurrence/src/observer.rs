//! Observer port for the recurrence engine and scheduler
//!
//! The engine reports every per-obligation outcome here instead of logging
//! directly. `TracingObserver` is the production implementation.

use chrono::NaiveDate;
use std::fmt;
use tracing::{debug, error, info, warn};

use core_kernel::ObligationId;

use crate::engine::TickReport;
use crate::error::RecurrenceError;
use crate::occurrence::MaterializedOccurrence;

/// Why a whole tick produced no report
#[derive(Debug)]
pub enum TickFailure {
    Error(RecurrenceError),
    Panicked(String),
}

impl fmt::Display for TickFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickFailure::Error(e) => write!(f, "{e}"),
            TickFailure::Panicked(message) => write!(f, "tick panicked: {message}"),
        }
    }
}

/// Receives engine and scheduler events
///
/// All methods default to doing nothing.
pub trait RecurrenceObserver: Send + Sync {
    fn tick_started(&self, _as_of: NaiveDate, _due: usize) {}

    fn materialized(&self, _occurrence: &MaterializedOccurrence) {}

    /// An occurrence for the date already existed; only the schedule moved
    fn already_present(&self, _obligation_id: ObligationId, _due_date: NaiveDate) {}

    /// Another writer changed the obligation mid-flight; the work was rolled back
    fn conflicted(&self, _obligation_id: ObligationId, _due_date: NaiveDate) {}

    /// Receives `RecurrenceError::Materialization`; the obligation stays due
    fn obligation_failed(&self, _failure: &RecurrenceError) {}

    fn tick_completed(&self, _report: &TickReport) {}

    fn tick_failed(&self, _failure: &TickFailure) {}
}

/// Writes observer events as structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RecurrenceObserver for TracingObserver {
    fn tick_started(&self, as_of: NaiveDate, due: usize) {
        debug!(as_of = %as_of, due = due, "Materialization tick started");
    }

    fn materialized(&self, occurrence: &MaterializedOccurrence) {
        info!(
            obligation_id = ?occurrence.obligation_id.map(|id| id.to_string()),
            occurrence_id = %occurrence.id,
            due_date = %occurrence.due_date,
            amount = %occurrence.amount,
            "Occurrence materialized"
        );
    }

    fn already_present(&self, obligation_id: ObligationId, due_date: NaiveDate) {
        info!(
            obligation_id = %obligation_id,
            due_date = %due_date,
            "Occurrence already present, schedule advanced"
        );
    }

    fn conflicted(&self, obligation_id: ObligationId, due_date: NaiveDate) {
        warn!(
            obligation_id = %obligation_id,
            due_date = %due_date,
            "Obligation changed during materialization, rolled back"
        );
    }

    fn obligation_failed(&self, failure: &RecurrenceError) {
        match failure {
            RecurrenceError::Materialization { obligation_id, due_date, source } => error!(
                obligation_id = %obligation_id,
                due_date = %due_date,
                transient = source.is_transient(),
                error = %source,
                "Materialization failed"
            ),
            other => error!(error = %other, "Materialization failed"),
        }
    }

    fn tick_completed(&self, report: &TickReport) {
        info!(
            as_of = %report.as_of,
            materialized = report.materialized.len(),
            already_present = report.already_present.len(),
            conflicted = report.conflicted.len(),
            failed = report.failed.len(),
            "Materialization tick completed"
        );
    }

    fn tick_failed(&self, failure: &TickFailure) {
        error!(error = %failure, "Materialization tick failed");
    }
}
