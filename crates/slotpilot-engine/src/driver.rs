//! UI automation driver capability
//!
//! The engine never sees markup or selectors. It talks to the remote
//! application only through these semantic operations; a concrete driver
//! (WebDriver, CDP, a recorded sandbox) maps them onto pages.
//!
//! Driver methods take `&self`. One driver instance belongs to one workflow
//! at a time, so implementations only need interior mutability for their own
//! page state.

use crate::config::Credentials;
use crate::error::DriverError;
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use slotpilot_schedule::TimeOfDay;

/// Token obtained from a successful login
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// Opaque credential (cookie, bearer token)
    pub value: String,
    /// Expiry advertised by the remote side, when known
    pub remote_expires_at: Option<DateTime<Utc>>,
}

impl SessionToken {
    /// Token without a known remote expiry
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            remote_expires_at: None,
        }
    }

    /// With remote expiry
    #[inline]
    #[must_use]
    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.remote_expires_at = Some(at);
        self
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"<redacted>")
            .field("remote_expires_at", &self.remote_expires_at)
            .finish()
    }
}

/// Rendered schedule view for one date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewHandle {
    /// Date shown
    pub date: NaiveDate,
    /// Driver-specific page reference
    pub id: String,
}

/// Open "new appointment" form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormHandle {
    /// Driver-specific form reference
    pub id: String,
}

/// Event element as rendered in a professional's column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Human-readable title, e.g. `"10:00 – 11:00 : Carlos"`
    pub title: String,
    /// Element is styled as blocked time rather than an appointment
    #[serde(default)]
    pub is_break: bool,
}

impl RawEvent {
    /// Appointment event
    #[inline]
    #[must_use]
    pub fn appointment(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            is_break: false,
        }
    }

    /// Break event
    #[inline]
    #[must_use]
    pub fn blocked(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            is_break: true,
        }
    }
}

/// Client record in the remote system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRef {
    /// Remote identifier
    pub id: String,
    /// Display name
    pub name: String,
}

/// Service record in the remote system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    /// Remote identifier
    pub id: String,
    /// Display name
    pub name: String,
}

/// Something the engine can pick by display name
pub trait Named {
    /// Display name used for matching
    fn display_name(&self) -> &str;
}

impl Named for ClientRef {
    fn display_name(&self) -> &str {
        &self.name
    }
}

impl Named for ServiceRef {
    fn display_name(&self) -> &str {
        &self.name
    }
}

/// Fields written into the booking form before submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentFields {
    /// Resolved client
    pub client: ClientRef,
    /// Professional as displayed in the schedule
    pub professional: String,
    /// Appointment date
    pub date: NaiveDate,
    /// Start time
    pub start_time: TimeOfDay,
    /// End time (`start + duration`)
    pub end_time: TimeOfDay,
    /// Attached services
    pub services: Vec<ServiceRef>,
}

/// How the remote confirmation UI reacted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationSignal {
    /// Recognizable success notice
    Success,
    /// Explicit error notice
    Error,
    /// Nothing recognizable
    Unknown,
}

/// Result of submitting the booking form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Classified confirmation
    pub signal: ConfirmationSignal,
    /// Remote message, verbatim
    pub message: String,
    /// Remote appointment reference, when shown
    pub reference: Option<String>,
}

impl SubmissionOutcome {
    /// Success outcome
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            signal: ConfirmationSignal::Success,
            message: message.into(),
            reference: None,
        }
    }

    /// Error outcome
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            signal: ConfirmationSignal::Error,
            message: message.into(),
            reference: None,
        }
    }

    /// With remote reference
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Semantic operations against the remote scheduling UI
///
/// Return `DriverError::NotReady` only when repeating the call is safe.
/// The engine never repeats `fill_and_submit`; a `NotReady` from it ends
/// the run as `TRANSIENT_UI_ERROR`.
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Log in and return the session credential
    async fn login(&self, credentials: &Credentials) -> Result<SessionToken, DriverError>;

    /// Attach an existing session to this driver instance
    async fn resume_session(&self, session: &Session) -> Result<(), DriverError>;

    /// Navigate to the schedule for `date`
    async fn open_schedule_view(&self, date: NaiveDate) -> Result<ViewHandle, DriverError>;

    /// Professional names in display order
    async fn professional_roster(&self, view: &ViewHandle) -> Result<Vec<String>, DriverError>;

    /// Event elements of one professional column
    async fn column_events(
        &self,
        view: &ViewHandle,
        column: usize,
    ) -> Result<Vec<RawEvent>, DriverError>;

    /// Trigger the "new appointment" action
    async fn open_booking_form(&self) -> Result<FormHandle, DriverError>;

    /// Client search/autocomplete results for `name`
    async fn search_clients(
        &self,
        form: &FormHandle,
        name: &str,
    ) -> Result<Vec<ClientRef>, DriverError>;

    /// Service search results for `name`
    async fn search_services(
        &self,
        form: &FormHandle,
        name: &str,
    ) -> Result<Vec<ServiceRef>, DriverError>;

    /// Add a resolved service to the form
    async fn attach_service(&self, form: &FormHandle, service: &ServiceRef)
        -> Result<(), DriverError>;

    /// Fill the remaining fields, submit and read the confirmation
    async fn fill_and_submit(
        &self,
        form: &FormHandle,
        fields: &AppointmentFields,
    ) -> Result<SubmissionOutcome, DriverError>;

    /// Release the underlying browser/page
    async fn close(&self) -> Result<(), DriverError>;
}

/// Creates fresh driver instances
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    /// Start a new browser/page
    async fn launch(&self) -> Result<Box<dyn UiDriver>, DriverError>;
}

/// Pick one record by name from search results
///
/// A single candidate is accepted as is. Among several, a unique
/// case-insensitive exact match wins. Anything else is `None`.
pub fn select_unique<'a, T: Named>(query: &str, candidates: &'a [T]) -> Option<&'a T> {
    match candidates {
        [] => None,
        [only] => Some(only),
        many => {
            let wanted = normalize_name(query);
            let mut exact = many
                .iter()
                .filter(|c| normalize_name(c.display_name()) == wanted);
            match (exact.next(), exact.next()) {
                (Some(hit), None) => Some(hit),
                _ => None,
            }
        }
    }
}

/// Trimmed, lowercased form used for name comparisons
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
