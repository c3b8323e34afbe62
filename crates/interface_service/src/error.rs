//! Service error handling

use serde::Serialize;
use thiserror::Error;

use core_kernel::PortError;
use domain_credit::CreditError;
use domain_recurrence::{RecurrenceError, TickFailure};
use infra_db::DatabaseError;

/// Errors surfaced by [`crate::LedgerService`] and the worker
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Credit(#[from] CreditError),

    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scheduler tick failed: {0}")]
    Tick(String),
}

impl From<config::ConfigError> for ServiceError {
    fn from(err: config::ConfigError) -> Self {
        ServiceError::Config(err.to_string())
    }
}

impl From<TickFailure> for ServiceError {
    fn from(failure: TickFailure) -> Self {
        match failure {
            TickFailure::Error(e) => ServiceError::Recurrence(e),
            TickFailure::Panicked(msg) => ServiceError::Tick(msg),
        }
    }
}

/// Error body handed to callers of the facade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Set when retrying the same call may succeed
    pub retryable: bool,
}

impl ServiceError {
    /// Stable machine-readable category
    pub fn error_type(&self) -> &'static str {
        match self {
            ServiceError::Credit(e) if e.is_validation() => "validation_error",
            ServiceError::Credit(e) if e.is_not_found() => "not_found",
            ServiceError::Credit(CreditError::AlreadySettled(_))
            | ServiceError::Credit(CreditError::DuplicateInvoice { .. }) => "conflict",
            ServiceError::Recurrence(e) if e.is_validation() => "validation_error",
            ServiceError::Recurrence(RecurrenceError::ObligationNotFound(_))
            | ServiceError::Recurrence(RecurrenceError::OccurrenceNotFound(_)) => "not_found",
            ServiceError::Recurrence(RecurrenceError::AlreadyPaid(_)) => "conflict",
            ServiceError::Credit(CreditError::Store(e)) | ServiceError::Recurrence(RecurrenceError::Store(e)) => {
                port_error_type(e)
            }
            ServiceError::Database(_) => "database_error",
            ServiceError::Config(_) => "config_error",
            ServiceError::Credit(_) | ServiceError::Recurrence(_) | ServiceError::Tick(_) => "internal_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Credit(CreditError::Store(e)) => e.is_transient(),
            ServiceError::Recurrence(e) => e.is_transient(),
            ServiceError::Database(e) => e.is_connection_error(),
            _ => false,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_type().to_string(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

fn port_error_type(error: &PortError) -> &'static str {
    match error {
        PortError::NotFound { .. } => "not_found",
        PortError::Validation { .. } => "validation_error",
        PortError::Conflict { .. } => "conflict",
        PortError::Connection { .. } | PortError::Timeout { .. } => "unavailable",
        PortError::Internal { .. } => "internal_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{CreditEntryId, OccurrenceId};

    #[test]
    fn test_already_settled_is_conflict() {
        let err = ServiceError::from(CreditError::AlreadySettled(CreditEntryId::new()));
        assert_eq!(err.error_type(), "conflict");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_connection_failure_is_retryable() {
        let err = ServiceError::from(CreditError::Store(PortError::connection("pool closed")));
        assert_eq!(err.error_type(), "unavailable");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_response_serializes() {
        let err = ServiceError::from(RecurrenceError::AlreadyPaid(OccurrenceId::new()));
        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["error"], "conflict");
        assert_eq!(json["retryable"], false);
    }

    #[test]
    fn test_panicked_tick_maps_to_tick_error() {
        let err = ServiceError::from(TickFailure::Panicked("boom".to_string()));
        assert_eq!(err.error_type(), "internal_error");
        assert!(err.to_string().contains("boom"));
    }
}
