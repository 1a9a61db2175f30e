//! Request and result entities

use crate::driver::{ClientRef, ServiceRef};
use crate::error::{BookingError, ErrorCode};
use crate::state::BookingState;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use slotpilot_schedule::{nearest_slots, Availability, FreePeriod, OccupiedInterval, TimeOfDay};

/// Request to book one appointment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Client name as typed into the search box
    pub client_name: String,
    /// Professional query, matched against the displayed roster
    pub professional_id: String,
    /// Appointment date
    pub date: NaiveDate,
    /// Requested start
    pub start_time: TimeOfDay,
    /// Length of the appointment
    pub duration_minutes: u32,
    /// Service names to attach
    #[serde(default)]
    pub services: Vec<String>,
}

impl BookingRequest {
    /// Create a request without services
    #[must_use]
    pub fn new(
        client_name: impl Into<String>,
        professional_id: impl Into<String>,
        date: NaiveDate,
        start_time: TimeOfDay,
        duration_minutes: u32,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            professional_id: professional_id.into(),
            date,
            start_time,
            duration_minutes,
            services: Vec::new(),
        }
    }

    /// With services
    #[must_use]
    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services = services.into_iter().map(Into::into).collect();
        self
    }

    /// End of the appointment
    ///
    /// # Errors
    /// `BookingError::InvalidRequest` when the appointment would end after
    /// midnight
    pub fn end_time(&self) -> Result<TimeOfDay, BookingError> {
        self.start_time
            .add_minutes(self.duration_minutes)
            .map_err(|_| {
                BookingError::InvalidRequest(format!(
                    "appointment starting {} for {} minutes ends after midnight",
                    self.start_time, self.duration_minutes
                ))
            })
    }

    /// Check the request before any remote call
    ///
    /// # Errors
    /// `BookingError::InvalidRequest` describing the first problem found
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.client_name.trim().is_empty() {
            return Err(BookingError::InvalidRequest(
                "client name must not be blank".to_string(),
            ));
        }
        if self.professional_id.trim().is_empty() {
            return Err(BookingError::InvalidRequest(
                "professional must not be blank".to_string(),
            ));
        }
        if self.duration_minutes == 0 {
            return Err(BookingError::InvalidRequest(
                "duration must be positive".to_string(),
            ));
        }
        if self.services.iter().any(|s| s.trim().is_empty()) {
            return Err(BookingError::InvalidRequest(
                "service names must not be blank".to_string(),
            ));
        }
        self.end_time().map(|_| ())
    }
}

/// Request for the free slots of one professional on one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    /// Professional query
    pub professional_id: String,
    /// Date to inspect
    pub date: NaiveDate,
}

impl AvailabilityQuery {
    /// Create query
    #[inline]
    #[must_use]
    pub fn new(professional_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            professional_id: professional_id.into(),
            date,
        }
    }
}

/// Free and occupied time of one professional on one date
///
/// Derived on every request; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    /// Date inspected
    pub date: NaiveDate,
    /// Professional as displayed
    pub professional_id: String,
    /// Free slot starts, ascending
    pub free_slots: Vec<TimeOfDay>,
    /// Maximal free runs, ascending
    pub free_periods: Vec<FreePeriod>,
    /// Intervals read from the calendar
    pub occupied_intervals: Vec<OccupiedInterval>,
}

impl AvailabilityResult {
    pub(crate) fn from_parts(
        date: NaiveDate,
        professional_id: String,
        availability: Availability,
        occupied_intervals: Vec<OccupiedInterval>,
    ) -> Self {
        Self {
            date,
            professional_id,
            free_slots: availability.free_slots,
            free_periods: availability.free_periods,
            occupied_intervals,
        }
    }

    /// Whether `slot` is free
    #[must_use]
    pub fn is_free(&self, slot: TimeOfDay) -> bool {
        self.free_slots.binary_search(&slot).is_ok()
    }

    /// Up to `limit` free slots nearest `requested`, ascending
    #[must_use]
    pub fn suggestions_near(&self, requested: TimeOfDay, limit: usize) -> Vec<TimeOfDay> {
        nearest_slots(&self.free_slots, requested, limit)
    }
}

/// Confirmed appointment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Resolved client
    pub client: ClientRef,
    /// Professional as displayed
    pub professional: String,
    /// Date
    pub date: NaiveDate,
    /// Start
    pub start_time: TimeOfDay,
    /// End
    pub end_time: TimeOfDay,
    /// Attached services
    pub services: Vec<ServiceRef>,
    /// Remote reference, when the confirmation showed one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Outcome status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Booking confirmed
    Success,
    /// Booking not made
    Failed,
}

/// Why a booking was not made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingFailure {
    /// Machine-readable code
    pub code: ErrorCode,
    /// Alternative free slots, only for `SLOT_UNAVAILABLE`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<TimeOfDay>,
}

/// Final outcome of a booking run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingResult {
    /// Success or failure
    pub status: BookingStatus,
    /// Human-readable message; verbatim remote text on rejection
    pub message: String,
    /// Booked appointment on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment: Option<Appointment>,
    /// Failure details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<BookingFailure>,
    /// Last state the workflow reached
    pub last_state: BookingState,
}

impl BookingResult {
    /// Confirmed booking
    #[must_use]
    pub fn confirmed(message: impl Into<String>, appointment: Appointment) -> Self {
        Self {
            status: BookingStatus::Success,
            message: message.into(),
            appointment: Some(appointment),
            failure: None,
            last_state: BookingState::Confirmed,
        }
    }

    /// Failed booking
    ///
    /// A remote rejection keeps the remote message as is.
    #[must_use]
    pub fn failed(error: &BookingError, last_state: BookingState) -> Self {
        let message = match error {
            BookingError::ExternalSystemRejected { message } => message.clone(),
            other => other.to_string(),
        };
        Self {
            status: BookingStatus::Failed,
            message,
            appointment: None,
            failure: Some(BookingFailure {
                code: error.code(),
                suggestions: error.suggestions().to_vec(),
            }),
            last_state,
        }
    }

    /// Whether the booking was made
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == BookingStatus::Success
    }

    /// Failure code, if any
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        self.failure.as_ref().map(|f| f.code)
    }
}
