use thiserror::Error;

use crate::domain::request::RequestStatus;

/// Failures produced by the pure state machine. Detected before any write;
/// the surrounding transaction rolls back in full.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("no step is awaiting action on this request")]
    NoActionableStep,
    #[error("actor is not assigned to step {sequence} ({step_name})")]
    NotAssigned { sequence: u32, step_name: String },
    #[error("request in status {status:?} cannot be edited")]
    NotEditable { status: RequestStatus },
    #[error("only the creator of a request may edit it")]
    NotRequestOwner,
    #[error("workflow route has no steps; a request cannot exist without a route")]
    EmptyRoute,
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("request not found")]
    NotFound,
    #[error("step was already processed by another approver")]
    AlreadyProcessed,
    #[error("workflow template service unavailable: {0}")]
    Upstream(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

/// User-facing error shape: a kind, a correlation id for support, and a
/// fixed message that never carries internals.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested document does not exist.",
            Self::Forbidden { .. } => "You are not allowed to act on this step.",
            Self::Conflict { .. } => "This step was already processed by someone else.",
            Self::ServiceUnavailable { .. } => {
                "The approval service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(domain) => match domain {
                DomainError::NotAssigned { sequence, step_name } => Self::Forbidden {
                    message: format!("not assigned to step {sequence} ({step_name})"),
                    correlation_id: unassigned,
                },
                DomainError::NotRequestOwner => Self::Forbidden {
                    message: "only the creator may edit this request".to_owned(),
                    correlation_id: unassigned,
                },
                other => Self::BadRequest { message: other.to_string(), correlation_id: unassigned },
            },
            ApplicationError::NotFound => {
                Self::NotFound { message: "request not found".to_owned(), correlation_id: unassigned }
            }
            ApplicationError::AlreadyProcessed => Self::Conflict {
                message: "step already processed".to_owned(),
                correlation_id: unassigned,
            },
            ApplicationError::Upstream(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned }
            }
            ApplicationError::Persistence(message) => {
                Self::Internal { message, correlation_id: unassigned }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::request::RequestStatus;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn not_assigned_maps_to_forbidden_with_correlation_id() {
        let interface = ApplicationError::from(DomainError::NotAssigned {
            sequence: 2,
            step_name: "Manager Review".to_owned(),
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::Forbidden { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(interface.user_message(), "You are not allowed to act on this step.");
    }

    #[test]
    fn invalid_state_maps_to_bad_request() {
        let interface = ApplicationError::from(DomainError::NotEditable {
            status: RequestStatus::Pending,
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
    }

    #[test]
    fn already_processed_maps_to_conflict() {
        let interface = ApplicationError::AlreadyProcessed.into_interface("req-3");
        assert!(matches!(interface, InterfaceError::Conflict { .. }));
        assert_eq!(interface.correlation_id(), "req-3");
    }

    #[test]
    fn upstream_failure_maps_to_service_unavailable() {
        let interface =
            ApplicationError::Upstream("connection refused".to_owned()).into_interface("req-4");
        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The approval service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn persistence_failure_maps_to_internal_with_safe_message() {
        let interface =
            ApplicationError::Persistence("disk io error".to_owned()).into_interface("req-5");
        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
