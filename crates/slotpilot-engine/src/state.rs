//! Booking workflow states and their legal transitions

use crate::error::BookingError;
use serde::{Deserialize, Serialize};

/// Workflow progress
///
/// A run that fails stops in the last state it reached; that state is
/// reported back with the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingState {
    /// Nothing done yet
    Init,
    /// Session attached to the driver
    Authenticated,
    /// "New appointment" form open
    FormOpened,
    /// Client resolved to one record
    ClientResolved,
    /// Requested start confirmed free
    SlotValidated,
    /// All services resolved and attached
    ServicesAttached,
    /// Form submitted
    Submitted,
    /// Remote system confirmed the booking
    Confirmed,
    /// Remote system did not confirm the booking
    Rejected,
}

impl BookingState {
    /// No further transition possible
    #[inline]
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }
}

impl std::fmt::Display for BookingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Authenticated => "authenticated",
            Self::FormOpened => "form_opened",
            Self::ClientResolved => "client_resolved",
            Self::SlotValidated => "slot_validated",
            Self::ServicesAttached => "services_attached",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Validate a state transition
///
/// # Errors
/// `BookingError::InvalidState` when `to` does not directly follow `from`
pub fn validate_transition(from: BookingState, to: BookingState) -> Result<(), BookingError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(BookingError::InvalidState(format!("{from} -> {to}")))
    }
}

/// States reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: BookingState) -> &'static [BookingState] {
    use BookingState::*;
    match from {
        Init => &[Authenticated],
        Authenticated => &[FormOpened],
        FormOpened => &[ClientResolved],
        ClientResolved => &[SlotValidated],
        SlotValidated => &[ServicesAttached],
        ServicesAttached => &[Submitted],
        Submitted => &[Confirmed, Rejected],
        Confirmed | Rejected => &[],
    }
}

/// Tracks the current state of one workflow run
#[derive(Debug, Clone)]
pub(crate) struct Progress {
    current: BookingState,
}

impl Progress {
    pub(crate) fn new() -> Self {
        Self {
            current: BookingState::Init,
        }
    }

    pub(crate) fn current(&self) -> BookingState {
        self.current
    }

    pub(crate) fn advance(&mut self, to: BookingState) -> Result<(), BookingError> {
        validate_transition(self.current, to)?;
        tracing::info!("Booking state {} -> {}", self.current, to);
        self.current = to;
        Ok(())
    }
}
