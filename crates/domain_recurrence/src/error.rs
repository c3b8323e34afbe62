//! Recurrence domain errors

use chrono::NaiveDate;
use thiserror::Error;

use core_kernel::{ObligationId, OccurrenceId, PortError};

/// Errors that can occur in the recurrence domain
#[derive(Debug, Error)]
pub enum RecurrenceError {
    /// Draft failed field validation
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Recurring obligation not found: {0}")]
    ObligationNotFound(ObligationId),

    #[error("Occurrence not found: {0}")]
    OccurrenceNotFound(OccurrenceId),

    #[error("Occurrence already paid: {0}")]
    AlreadyPaid(OccurrenceId),

    /// Materializing one obligation failed; carries enough context to replay it
    #[error("Materializing {obligation_id} due {due_date} failed: {source}")]
    Materialization {
        obligation_id: ObligationId,
        due_date: NaiveDate,
        #[source]
        source: PortError,
    },

    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

impl RecurrenceError {
    pub fn is_validation(&self) -> bool {
        matches!(self, RecurrenceError::Validation(_) | RecurrenceError::InvalidRule(_))
    }

    /// True when the next tick may succeed without intervention
    pub fn is_transient(&self) -> bool {
        match self {
            RecurrenceError::Store(e) | RecurrenceError::Materialization { source: e, .. } => {
                e.is_transient()
            }
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for RecurrenceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        RecurrenceError::Validation(errors.to_string())
    }
}
