//! JSON request and response bodies
//!
//! Field names are camelCase on the wire. Times are `"HH:MM"`, dates
//! `"YYYY-MM-DD"`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use slotpilot_engine::{
    Appointment, AvailabilityResult, BookingError, BookingRequest, BookingResult, ErrorCode,
};
use slotpilot_schedule::{FreePeriod, OccupiedInterval, TimeOfDay};

/// `POST /availability` body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequestDto {
    /// Professional query; falls back to the configured default
    #[serde(default)]
    pub professional_id: Option<String>,
    /// Date; defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Successful availability response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    /// Always `true`
    pub success: bool,
    /// Professional as displayed
    pub professional_id: String,
    /// Date inspected
    pub date: NaiveDate,
    /// Free slot starts
    pub free_slots: Vec<TimeOfDay>,
    /// Maximal free runs
    pub free_periods: Vec<FreePeriod>,
    /// Intervals read from the calendar
    pub occupied_intervals: Vec<OccupiedInterval>,
}

impl From<AvailabilityResult> for AvailabilityResponse {
    fn from(result: AvailabilityResult) -> Self {
        Self {
            success: true,
            professional_id: result.professional_id,
            date: result.date,
            free_slots: result.free_slots,
            free_periods: result.free_periods,
            occupied_intervals: result.occupied_intervals,
        }
    }
}

/// `POST /bookings` body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequestDto {
    /// Client name
    pub client_name: String,
    /// Professional query; falls back to the configured default
    #[serde(default)]
    pub professional_id: Option<String>,
    /// Appointment date
    pub date: NaiveDate,
    /// Start, `"HH:MM"`
    pub start_time: TimeOfDay,
    /// Length in minutes
    pub duration_minutes: u32,
    /// Service names
    #[serde(default)]
    pub services: Vec<String>,
}

impl BookingRequestDto {
    /// Engine request, using `default_professional` when none was given
    ///
    /// # Errors
    /// `InvalidRequest` when neither names a professional
    pub fn into_request(
        self,
        default_professional: Option<&str>,
    ) -> Result<BookingRequest, BookingError> {
        let professional = resolve_professional(self.professional_id, default_professional)?;
        Ok(BookingRequest::new(
            self.client_name,
            professional,
            self.date,
            self.start_time,
            self.duration_minutes,
        )
        .with_services(self.services))
    }
}

/// `POST /automate` body
///
/// One endpoint for every action, keyed by `action`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomateRequestDto {
    /// `check`, `list` or `book`
    #[serde(default)]
    pub action: Option<String>,
    /// Professional query
    #[serde(default, alias = "professionalId")]
    pub professional_name: Option<String>,
    /// Date; defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Client name, for `book`
    #[serde(default)]
    pub client_name: Option<String>,
    /// Start, for `book`
    #[serde(default)]
    pub start_time: Option<TimeOfDay>,
    /// Length in minutes, for `book`
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// Service names, for `book`
    #[serde(default)]
    pub services: Vec<String>,
}

/// Parsed `/automate` action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomateAction {
    /// Availability of one professional
    Check,
    /// Book an appointment
    Book,
}

impl AutomateRequestDto {
    /// Classify `action`
    ///
    /// # Errors
    /// `InvalidRequest` for a missing or unknown action
    pub fn action(&self) -> Result<AutomateAction, BookingError> {
        match self.action.as_deref().map(str::trim) {
            None | Some("") => Err(BookingError::InvalidRequest("action is required".to_string())),
            Some("check" | "list") => Ok(AutomateAction::Check),
            Some("book") => Ok(AutomateAction::Book),
            Some(_) => Err(BookingError::InvalidRequest("invalid action".to_string())),
        }
    }

    /// As an availability request
    #[must_use]
    pub fn availability(&self) -> AvailabilityRequestDto {
        AvailabilityRequestDto {
            professional_id: self.professional_name.clone(),
            date: self.date,
        }
    }

    /// As a booking request
    ///
    /// # Errors
    /// `InvalidRequest` naming the first missing field
    pub fn booking(self, today: NaiveDate) -> Result<BookingRequestDto, BookingError> {
        let missing = |field: &str| BookingError::InvalidRequest(format!("{field} is required"));
        Ok(BookingRequestDto {
            client_name: self.client_name.ok_or_else(|| missing("clientName"))?,
            professional_id: self.professional_name,
            date: self.date.unwrap_or(today),
            start_time: self.start_time.ok_or_else(|| missing("startTime"))?,
            duration_minutes: self.duration_minutes.ok_or_else(|| missing("durationMinutes"))?,
            services: self.services,
        })
    }
}

/// Successful booking response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    /// Always `true`
    pub success: bool,
    /// Confirmation message
    pub message: String,
    /// Booked appointment
    pub appointment: AppointmentDto,
}

/// Appointment on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDto {
    /// Client name
    pub client_name: String,
    /// Professional as displayed
    pub professional: String,
    /// Date
    pub date: NaiveDate,
    /// Start
    pub start_time: TimeOfDay,
    /// End
    pub end_time: TimeOfDay,
    /// Attached service names
    pub services: Vec<String>,
    /// Remote reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl From<Appointment> for AppointmentDto {
    fn from(appointment: Appointment) -> Self {
        Self {
            client_name: appointment.client.name,
            professional: appointment.professional,
            date: appointment.date,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            services: appointment.services.into_iter().map(|s| s.name).collect(),
            reference: appointment.reference,
        }
    }
}

/// Failure body shared by every route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    /// Human-readable message
    pub error: String,
    /// Machine-readable code
    pub code: ErrorCode,
    /// Alternative slots for `SLOT_UNAVAILABLE`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<TimeOfDay>,
}

impl ErrorResponse {
    /// Failure with no suggestions
    #[must_use]
    pub fn new(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code,
            suggestions: Vec::new(),
        }
    }
}

impl From<&BookingError> for ErrorResponse {
    fn from(error: &BookingError) -> Self {
        Self {
            suggestions: error.suggestions().to_vec(),
            ..Self::new(error.code(), error.to_string())
        }
    }
}

/// Booking outcome as a success or failure body
#[derive(Debug, Clone)]
pub enum BookingOutcome {
    /// Confirmed
    Booked(BookingResponse),
    /// Not booked
    Failed(ErrorResponse),
}

impl From<BookingResult> for BookingOutcome {
    fn from(result: BookingResult) -> Self {
        match (result.appointment, result.failure) {
            (Some(appointment), None) => Self::Booked(BookingResponse {
                success: true,
                message: result.message,
                appointment: appointment.into(),
            }),
            (_, Some(failure)) => Self::Failed(ErrorResponse {
                success: false,
                error: result.message,
                code: failure.code,
                suggestions: failure.suggestions,
            }),
            (None, None) => Self::Failed(ErrorResponse::new(
                ErrorCode::ExternalSystemError,
                result.message,
            )),
        }
    }
}

/// `GET /health` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"`
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Requested professional, else the configured default
///
/// # Errors
/// `InvalidRequest` when neither is set
pub fn resolve_professional(
    requested: Option<String>,
    default_professional: Option<&str>,
) -> Result<String, BookingError> {
    requested
        .filter(|p| !p.trim().is_empty())
        .or_else(|| default_professional.map(str::to_string))
        .ok_or_else(|| BookingError::InvalidRequest("professionalId is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn booking_body_is_camel_case() {
        let dto: BookingRequestDto = serde_json::from_str(
            r#"{"clientName":"Carlos","professionalId":"Ana","date":"2025-03-14",
                "startTime":"10:00","durationMinutes":60,"services":["Corte"]}"#,
        )
        .unwrap();
        let request = dto.into_request(None).unwrap();
        assert_eq!(request.client_name, "Carlos");
        assert_eq!(request.start_time.to_string(), "10:00");
        assert_eq!(request.services, vec!["Corte".to_string()]);
    }

    #[test]
    fn missing_professional_uses_default() {
        assert_eq!(resolve_professional(None, Some("Ana")).unwrap(), "Ana");
        assert_eq!(
            resolve_professional(Some(" ".into()), Some("Ana")).unwrap(),
            "Ana"
        );
        assert!(resolve_professional(None, None).is_err());
    }

    #[test]
    fn automate_actions() {
        let with = |action: Option<&str>| AutomateRequestDto {
            action: action.map(str::to_string),
            ..AutomateRequestDto::default()
        };
        assert_eq!(with(Some("check")).action().unwrap(), AutomateAction::Check);
        assert_eq!(with(Some("list")).action().unwrap(), AutomateAction::Check);
        assert_eq!(with(Some("book")).action().unwrap(), AutomateAction::Book);
        assert_eq!(
            with(None).action().unwrap_err(),
            BookingError::InvalidRequest("action is required".into())
        );
        assert_eq!(
            with(Some("cancel")).action().unwrap_err(),
            BookingError::InvalidRequest("invalid action".into())
        );
    }

    #[test]
    fn slot_error_body_carries_suggestions() {
        let error = BookingError::SlotUnavailable {
            requested: "10:00".parse().unwrap(),
            suggestions: vec!["11:00".parse().unwrap()],
        };
        let body = serde_json::to_value(ErrorResponse::from(&error)).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "SLOT_UNAVAILABLE");
        assert_eq!(body["suggestions"], serde_json::json!(["11:00"]));
    }
}
