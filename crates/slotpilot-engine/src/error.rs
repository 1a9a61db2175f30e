//! Error types for the booking engine
//!
//! Two layers:
//! - `DriverError` is what a UI automation driver reports
//! - `BookingError` is the engine's taxonomy, split into terminal and
//!   transient failures
//!
//! Only `TransientUi` is ever retried. Retry exhaustion becomes `Timeout`,
//! which is terminal.

use serde::{Deserialize, Serialize};
use slotpilot_schedule::{ScheduleError, TimeOfDay};

/// Failure reported by a UI automation driver
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// Expected element or view did not render in time
    #[error("not ready: {0}")]
    NotReady(String),

    /// Remote side refused the credentials
    #[error("credentials rejected: {0}")]
    CredentialsRejected(String),

    /// Anything else, message preserved
    #[error("{0}")]
    Failed(String),
}

/// Stable machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Login failed or credentials rejected
    AuthenticationError,
    /// No displayed professional matches the query
    ProfessionalNotFound,
    /// Several displayed professionals match the query
    ProfessionalAmbiguous,
    /// Client search was empty or ambiguous
    ClientNotFound,
    /// Service search was empty or ambiguous
    ServiceNotFound,
    /// Requested start time is not free
    SlotUnavailable,
    /// Business hours or engine settings are malformed
    InvalidConfiguration,
    /// Booking or availability request is malformed
    InvalidRequest,
    /// Remote confirmation was not a success signal
    ExternalSystemRejected,
    /// Element or view not ready
    TransientUiError,
    /// Step timeout, workflow timeout or retry exhaustion
    Timeout,
    /// Unclassified collaborator failure
    ExternalSystemError,
    /// Engine attempted an out-of-order transition
    InvalidState,
}

impl ErrorCode {
    /// Wire form, e.g. `SLOT_UNAVAILABLE`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationError => "AUTHENTICATION_ERROR",
            Self::ProfessionalNotFound => "PROFESSIONAL_NOT_FOUND",
            Self::ProfessionalAmbiguous => "PROFESSIONAL_AMBIGUOUS",
            Self::ClientNotFound => "CLIENT_NOT_FOUND",
            Self::ServiceNotFound => "SERVICE_NOT_FOUND",
            Self::SlotUnavailable => "SLOT_UNAVAILABLE",
            Self::InvalidConfiguration => "INVALID_CONFIGURATION",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::ExternalSystemRejected => "EXTERNAL_SYSTEM_REJECTED",
            Self::TransientUiError => "TRANSIENT_UI_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ExternalSystemError => "EXTERNAL_SYSTEM_ERROR",
            Self::InvalidState => "INVALID_STATE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main engine error type
///
/// `Clone` so a single authentication failure can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    /// Authentication failed
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// No column matches the professional
    #[error("professional {query:?} not found; displayed: {}", .available.join(", "))]
    ProfessionalNotFound {
        /// Search term
        query: String,
        /// Names on screen, in display order
        available: Vec<String>,
    },

    /// More than one column matches the professional
    #[error("professional {query:?} is ambiguous; matches: {}", .matches.join(", "))]
    AmbiguousProfessional {
        /// Search term
        query: String,
        /// Matching names, in display order
        matches: Vec<String>,
    },

    /// Client search returned nothing usable
    #[error("client {query:?} not found{}", candidate_suffix(.candidates))]
    ClientNotFound {
        /// Search term
        query: String,
        /// Returned candidates when the match was ambiguous
        candidates: Vec<String>,
    },

    /// Service search returned nothing usable
    #[error("service {query:?} not found{}", candidate_suffix(.candidates))]
    ServiceNotFound {
        /// Search term
        query: String,
        /// Returned candidates when the match was ambiguous
        candidates: Vec<String>,
    },

    /// Requested slot is not free
    #[error("slot {requested} is not available")]
    SlotUnavailable {
        /// Requested start
        requested: TimeOfDay,
        /// Nearby free slots, ascending
        suggestions: Vec<TimeOfDay>,
    },

    /// Malformed configuration
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Malformed request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Remote confirmation was not a success; message is verbatim
    #[error("booking rejected by remote system: {message}")]
    ExternalSystemRejected {
        /// Remote message, unmodified
        message: String,
    },

    /// Element or view not ready
    #[error("{step}: UI not ready: {message}")]
    TransientUi {
        /// Step that failed
        step: String,
        /// Driver message
        message: String,
    },

    /// Timeout or retry exhaustion
    #[error("{step} timed out: {detail}")]
    Timeout {
        /// Step or scope that timed out
        step: String,
        /// What ran out
        detail: String,
    },

    /// Unclassified collaborator failure
    #[error("external system error: {0}")]
    ExternalSystem(String),

    /// Out-of-order state transition
    #[error("invalid workflow transition: {0}")]
    InvalidState(String),
}

fn candidate_suffix(candidates: &[String]) -> String {
    if candidates.is_empty() {
        String::new()
    } else {
        format!("; candidates: {}", candidates.join(", "))
    }
}

impl BookingError {
    /// Map a driver failure observed during `step`
    #[must_use]
    pub fn from_driver(step: &str, error: DriverError) -> Self {
        match error {
            DriverError::NotReady(message) => Self::TransientUi {
                step: step.to_string(),
                message,
            },
            DriverError::CredentialsRejected(message) => Self::Authentication(message),
            DriverError::Failed(message) => Self::ExternalSystem(format!("{step}: {message}")),
        }
    }

    /// Machine-readable code
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication(_) => ErrorCode::AuthenticationError,
            Self::ProfessionalNotFound { .. } => ErrorCode::ProfessionalNotFound,
            Self::AmbiguousProfessional { .. } => ErrorCode::ProfessionalAmbiguous,
            Self::ClientNotFound { .. } => ErrorCode::ClientNotFound,
            Self::ServiceNotFound { .. } => ErrorCode::ServiceNotFound,
            Self::SlotUnavailable { .. } => ErrorCode::SlotUnavailable,
            Self::InvalidConfiguration(_) => ErrorCode::InvalidConfiguration,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::ExternalSystemRejected { .. } => ErrorCode::ExternalSystemRejected,
            Self::TransientUi { .. } => ErrorCode::TransientUiError,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::ExternalSystem(_) => ErrorCode::ExternalSystemError,
            Self::InvalidState(_) => ErrorCode::InvalidState,
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientUi { .. })
    }

    /// Check if error ends the workflow
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_transient()
    }

    /// Alternative slots carried by `SlotUnavailable`
    #[must_use]
    pub fn suggestions(&self) -> &[TimeOfDay] {
        match self {
            Self::SlotUnavailable { suggestions, .. } => suggestions,
            _ => &[],
        }
    }
}

impl From<ScheduleError> for BookingError {
    fn from(error: ScheduleError) -> Self {
        Self::InvalidConfiguration(error.to_string())
    }
}
