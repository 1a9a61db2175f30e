//! Booking workflow engine
//!
//! Drives one booking through the remote UI as a linear sequence of steps.
//! Every remote step runs under the retry policy and the per-step timeout;
//! the whole run is bounded by the workflow timeout. The driver lease is
//! released on every exit path.

use crate::config::EngineConfig;
use crate::driver::{select_unique, AppointmentFields, ConfirmationSignal, DriverLauncher, UiDriver};
use crate::error::BookingError;
use crate::extractor::ScheduleExtractor;
use crate::lease::DriverLease;
use crate::retry::within;
use crate::session::{Session, SessionManager};
use crate::state::{BookingState, Progress};
use crate::types::{Appointment, AvailabilityQuery, AvailabilityResult, BookingRequest, BookingResult};
use slotpilot_schedule::{compute, Availability, TimeOfDay};
use std::sync::Arc;

const DEFAULT_CONFIRMATION: &str = "Appointment booked";

/// Booking and availability over a UI automation driver
pub struct BookingEngine {
    launcher: Arc<dyn DriverLauncher>,
    sessions: Arc<SessionManager>,
    extractor: ScheduleExtractor,
    config: EngineConfig,
}

impl BookingEngine {
    /// Create new engine
    ///
    /// # Errors
    /// `BookingError::InvalidConfiguration` when `config` does not validate
    pub fn new(
        launcher: Arc<dyn DriverLauncher>,
        sessions: Arc<SessionManager>,
        config: EngineConfig,
    ) -> Result<Self, BookingError> {
        config.validate()?;
        Ok(Self {
            launcher,
            sessions,
            extractor: ScheduleExtractor::from_config(&config),
            config,
        })
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared session manager
    #[inline]
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Free and occupied time of one professional on one date
    ///
    /// # Errors
    /// Any terminal `BookingError` from authentication, extraction or the
    /// calculator; `Timeout` when the run exceeds the workflow timeout
    pub async fn check_availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<AvailabilityResult, BookingError> {
        if query.professional_id.trim().is_empty() {
            return Err(BookingError::InvalidRequest(
                "professional must not be blank".to_string(),
            ));
        }
        tracing::info!(
            "Checking availability of {:?} on {}",
            query.professional_id,
            query.date
        );

        within("check_availability", self.config.workflow_timeout(), async {
            let lease = DriverLease::acquire(self.launcher.as_ref()).await?;
            let outcome = self.read_availability(&*lease, query).await;
            lease.release().await;
            outcome
        })
        .await
    }

    /// Book an appointment, returning the typed error on failure
    ///
    /// # Errors
    /// The first terminal `BookingError` of the run
    pub async fn try_book(&self, request: BookingRequest) -> Result<Appointment, BookingError> {
        let mut progress = Progress::new();
        within(
            "booking",
            self.config.workflow_timeout(),
            self.run_booking(&request, &mut progress),
        )
        .await
        .map(|(appointment, _)| appointment)
    }

    /// Book an appointment
    ///
    /// Never fails: every failure becomes a `BookingResult` carrying the
    /// error code and the last state reached.
    pub async fn book(&self, request: BookingRequest) -> BookingResult {
        let mut progress = Progress::new();
        let outcome = within(
            "booking",
            self.config.workflow_timeout(),
            self.run_booking(&request, &mut progress),
        )
        .await;
        let last_state = progress.current();

        match outcome {
            Ok((appointment, message)) => {
                tracing::info!(
                    "Booked {} with {} on {} at {}",
                    appointment.client.name,
                    appointment.professional,
                    appointment.date,
                    appointment.start_time
                );
                BookingResult::confirmed(message, appointment)
            }
            Err(error) => {
                tracing::error!("Booking failed in state {}: {}", last_state, error);
                BookingResult::failed(&error, last_state)
            }
        }
    }

    async fn read_availability(
        &self,
        driver: &dyn UiDriver,
        query: &AvailabilityQuery,
    ) -> Result<AvailabilityResult, BookingError> {
        self.attach_session(driver).await?;
        let schedule = self
            .extractor
            .fetch_occupied(driver, query.date, &query.professional_id)
            .await?;
        let availability = compute(&schedule.occupied, &self.config.business_hours)?;
        Ok(AvailabilityResult::from_parts(
            query.date,
            schedule.professional,
            availability,
            schedule.occupied,
        ))
    }

    async fn run_booking(
        &self,
        request: &BookingRequest,
        progress: &mut Progress,
    ) -> Result<(Appointment, String), BookingError> {
        request.validate()?;
        tracing::info!(
            "Booking {:?} with {:?} on {} at {} for {} min",
            request.client_name,
            request.professional_id,
            request.date,
            request.start_time,
            request.duration_minutes
        );

        let lease = DriverLease::acquire(self.launcher.as_ref()).await?;
        tracing::debug!("Booking runs on driver lease {}", lease.id());
        let outcome = self.drive_booking(&*lease, request, progress).await;
        lease.release().await;
        outcome
    }

    async fn drive_booking(
        &self,
        driver: &dyn UiDriver,
        request: &BookingRequest,
        progress: &mut Progress,
    ) -> Result<(Appointment, String), BookingError> {
        let retry = &self.config.retry;
        let limit = self.config.step_timeout();
        let end_time = request.end_time()?;

        self.attach_session(driver).await?;
        progress.advance(BookingState::Authenticated)?;

        let form = retry
            .run_step("open_booking_form", limit, move || driver.open_booking_form())
            .await?;
        let form = &form;
        progress.advance(BookingState::FormOpened)?;

        let client_name = request.client_name.as_str();
        let clients = retry
            .run_step("search_clients", limit, move || {
                driver.search_clients(form, client_name)
            })
            .await?;
        let client = select_unique(client_name, &clients)
            .cloned()
            .ok_or_else(|| BookingError::ClientNotFound {
                query: request.client_name.clone(),
                candidates: clients.iter().map(|c| c.name.clone()).collect(),
            })?;
        progress.advance(BookingState::ClientResolved)?;

        let professional = self
            .validate_slot(driver, request, end_time)
            .await?;
        progress.advance(BookingState::SlotValidated)?;

        let mut services = Vec::with_capacity(request.services.len());
        for name in &request.services {
            let name = name.as_str();
            let found = retry
                .run_step("search_services", limit, move || {
                    driver.search_services(form, name)
                })
                .await?;
            let service = select_unique(name, &found).cloned().ok_or_else(|| {
                BookingError::ServiceNotFound {
                    query: name.to_string(),
                    candidates: found.iter().map(|s| s.name.clone()).collect(),
                }
            })?;
            services.push(service);
        }
        for service in &services {
            retry
                .run_step("attach_service", limit, move || {
                    driver.attach_service(form, service)
                })
                .await?;
        }
        progress.advance(BookingState::ServicesAttached)?;

        let fields = AppointmentFields {
            client,
            professional,
            date: request.date,
            start_time: request.start_time,
            end_time,
            services,
        };
        // Submit runs once; it is not idempotent.
        let outcome = retry
            .run_step_if("fill_and_submit", limit, |_| false, || {
                driver.fill_and_submit(form, &fields)
            })
            .await?;
        progress.advance(BookingState::Submitted)?;

        match outcome.signal {
            ConfirmationSignal::Success => {
                progress.advance(BookingState::Confirmed)?;
                let message = if outcome.message.trim().is_empty() {
                    DEFAULT_CONFIRMATION.to_string()
                } else {
                    outcome.message
                };
                let appointment = Appointment {
                    client: fields.client,
                    professional: fields.professional,
                    date: fields.date,
                    start_time: fields.start_time,
                    end_time: fields.end_time,
                    services: fields.services,
                    reference: outcome.reference,
                };
                Ok((appointment, message))
            }
            ConfirmationSignal::Error | ConfirmationSignal::Unknown => {
                progress.advance(BookingState::Rejected)?;
                Err(BookingError::ExternalSystemRejected {
                    message: outcome.message,
                })
            }
        }
    }

    /// Attach a cached or fresh session to `driver`
    ///
    /// A session the remote side refuses is dropped and replaced once.
    async fn attach_session(&self, driver: &dyn UiDriver) -> Result<(), BookingError> {
        let session = self.sessions.get_session().await?;
        match self.resume(driver, &session).await {
            Err(BookingError::Authentication(reason)) => {
                tracing::warn!("Cached session refused ({}); logging in again", reason);
                self.sessions.invalidate();
                let fresh = self.sessions.get_session().await?;
                self.resume(driver, &fresh).await
            }
            other => other,
        }
    }

    async fn resume(&self, driver: &dyn UiDriver, session: &Session) -> Result<(), BookingError> {
        self.config
            .retry
            .run_step("resume_session", self.config.step_timeout(), move || {
                driver.resume_session(session)
            })
            .await
    }

    /// Re-read the schedule and check the requested slot
    ///
    /// Returns the professional's displayed name.
    async fn validate_slot(
        &self,
        driver: &dyn UiDriver,
        request: &BookingRequest,
        end_time: TimeOfDay,
    ) -> Result<String, BookingError> {
        let schedule = self
            .extractor
            .fetch_occupied(driver, request.date, &request.professional_id)
            .await?;
        let availability = compute(&schedule.occupied, &self.config.business_hours)?;

        let start_free = availability.is_free(request.start_time);
        let fits = start_free
            && (!self.config.require_full_duration
                || self.covers_duration(&availability, request.start_time, end_time));

        if fits {
            Ok(schedule.professional)
        } else {
            let suggestions =
                availability.suggestions_near(request.start_time, self.config.suggestion_limit);
            tracing::info!(
                "Slot {} unavailable for {}; {} suggestions",
                request.start_time,
                schedule.professional,
                suggestions.len()
            );
            Err(BookingError::SlotUnavailable {
                requested: request.start_time,
                suggestions,
            })
        }
    }

    fn covers_duration(&self, availability: &Availability, start: TimeOfDay, end: TimeOfDay) -> bool {
        let hours = &self.config.business_hours;
        end <= hours.close
            && hours
                .candidate_slots()
                .into_iter()
                .filter(|slot| *slot >= start && *slot < end)
                .all(|slot| availability.is_free(slot))
    }
}

impl std::fmt::Debug for BookingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingEngine")
            .field("sessions", &self.sessions)
            .field("extractor", &self.extractor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
