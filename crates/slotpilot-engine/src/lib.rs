//! slotpilot engine
//!
//! Books appointments in a remote scheduling web application by driving
//! its user interface:
//! - Caches one authenticated session and logs in single-flight on a miss
//! - Extracts a professional's occupied intervals from the calendar view
//! - Validates the requested slot against freshly computed availability
//! - Fills and submits the booking form and classifies the confirmation
//!
//! All page interaction sits behind the [`UiDriver`] trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotpilot_engine::{BookingEngine, BookingRequest, EngineConfig, SessionManager};
//! use std::sync::Arc;
//!
//! # async fn example(launcher: Arc<dyn slotpilot_engine::DriverLauncher>,
//! #                  credentials: slotpilot_engine::Credentials) -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::new();
//! let sessions = Arc::new(SessionManager::with_driver_login(launcher.clone(), credentials, &config));
//! let engine = BookingEngine::new(launcher, sessions, config)?;
//!
//! let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
//! let request = BookingRequest::new("Carlos", "Ana", date, "10:00".parse()?, 60)
//!     .with_services(["Corte"]);
//! let result = engine.book(request).await;
//! println!("{}", result.message);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod driver;
pub mod error;
pub mod extractor;
pub mod lease;
pub mod retry;
pub mod session;
pub mod state;
pub mod types;
pub mod workflow;

pub use config::{Credentials, EngineConfig};
pub use driver::{
    select_unique, AppointmentFields, ClientRef, ConfirmationSignal, DriverLauncher, FormHandle,
    Named, RawEvent, ServiceRef, SessionToken, SubmissionOutcome, UiDriver, ViewHandle,
};
pub use error::{BookingError, DriverError, ErrorCode};
pub use extractor::{match_professional, parse_event, ExtractedSchedule, ScheduleExtractor};
pub use lease::DriverLease;
pub use retry::{within, RetryPolicy, RetryableError};
pub use session::{
    Authenticator, DriverAuthenticator, InMemorySessionStore, Session, SessionManager,
    SessionStore,
};
pub use state::{allowed_transitions, validate_transition, BookingState};
pub use types::{
    Appointment, AvailabilityQuery, AvailabilityResult, BookingFailure, BookingRequest,
    BookingResult, BookingStatus,
};
pub use workflow::BookingEngine;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
