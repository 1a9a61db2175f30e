//! Testing utilities for the slotpilot workspace
//!
//! A scripted in-memory salon that implements the driver traits, with
//! failure injection, artificial delays and a journal of every call.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use slotpilot_engine::{
    AppointmentFields, Authenticator, BookingError, BookingRequest, ClientRef, Credentials,
    DriverError, DriverLauncher, EngineConfig, FormHandle, RawEvent, RetryPolicy, ServiceRef,
    Session, SessionToken, SubmissionOutcome, UiDriver, ViewHandle,
};
use slotpilot_schedule::TimeOfDay;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const LOGIN: &str = "login";
pub const RESUME_SESSION: &str = "resume_session";
pub const OPEN_SCHEDULE_VIEW: &str = "open_schedule_view";
pub const PROFESSIONAL_ROSTER: &str = "professional_roster";
pub const COLUMN_EVENTS: &str = "column_events";
pub const OPEN_BOOKING_FORM: &str = "open_booking_form";
pub const SEARCH_CLIENTS: &str = "search_clients";
pub const SEARCH_SERVICES: &str = "search_services";
pub const ATTACH_SERVICE: &str = "attach_service";
pub const FILL_AND_SUBMIT: &str = "fill_and_submit";
pub const CLOSE: &str = "close";

pub fn t(s: &str) -> TimeOfDay {
    s.parse().unwrap()
}

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
}

pub fn client(id: &str, name: &str) -> ClientRef {
    ClientRef {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn service(id: &str, name: &str) -> ServiceRef {
    ServiceRef {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// 10:00 booking of Carlos with Ana for an hour, one service
pub fn booking_request() -> BookingRequest {
    BookingRequest::new("Carlos Lima", "Ana", test_date(), t("10:00"), 60).with_services(["Corte"])
}

/// Engine config with short, deterministic timings
pub fn fast_config() -> EngineConfig {
    EngineConfig::new()
        .with_retry(RetryPolicy::new(3, Duration::from_millis(10), 2.0))
        .with_step_timeout(Duration::from_secs(2))
        .with_workflow_timeout(Duration::from_secs(30))
}

#[derive(Debug, Default)]
struct SalonState {
    credentials: Option<Credentials>,
    roster: Vec<String>,
    events: HashMap<usize, Vec<RawEvent>>,
    clients: Vec<ClientRef>,
    services: Vec<ServiceRef>,
    outcome: Option<SubmissionOutcome>,
    failures: HashMap<&'static str, VecDeque<DriverError>>,
    delays: HashMap<&'static str, Duration>,
    refuse_sessions: usize,
    submitted: Vec<AppointmentFields>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<SalonState>,
    journal: Mutex<Vec<&'static str>>,
    launches: AtomicUsize,
    logins: AtomicUsize,
}

/// Scripted remote salon
///
/// Clones share the same script, journal and counters.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSalon {
    shared: Arc<Shared>,
}

impl ScriptedSalon {
    /// Two professionals, one client, two services, success on submit
    pub fn new() -> Self {
        let salon = Self::default();
        {
            let mut state = salon.shared.state.lock();
            state.roster = vec!["Ana Souza".into(), "Bruno Oliveira".into()];
            state.clients = vec![client("c1", "Carlos Lima")];
            state.services = vec![service("s1", "Corte"), service("s2", "Barba")];
            state.outcome = Some(SubmissionOutcome::success("Agendamento criado com sucesso"));
        }
        salon
    }

    pub fn with_credentials(self, credentials: Credentials) -> Self {
        self.shared.state.lock().credentials = Some(credentials);
        self
    }

    pub fn with_roster(self, names: &[&str]) -> Self {
        self.shared.state.lock().roster = names.iter().map(|n| (*n).to_string()).collect();
        self
    }

    pub fn with_events(self, column: usize, events: Vec<RawEvent>) -> Self {
        self.shared.state.lock().events.insert(column, events);
        self
    }

    pub fn with_clients(self, clients: Vec<ClientRef>) -> Self {
        self.shared.state.lock().clients = clients;
        self
    }

    pub fn with_services(self, services: Vec<ServiceRef>) -> Self {
        self.shared.state.lock().services = services;
        self
    }

    pub fn with_outcome(self, outcome: SubmissionOutcome) -> Self {
        self.shared.state.lock().outcome = Some(outcome);
        self
    }

    /// Fail the next `times` calls of `op` with `error`
    pub fn fail_next(self, op: &'static str, times: usize, error: DriverError) -> Self {
        {
            let mut state = self.shared.state.lock();
            let queue = state.failures.entry(op).or_default();
            queue.extend(std::iter::repeat(error).take(times));
        }
        self
    }

    /// Delay every call of `op`
    pub fn delay(self, op: &'static str, by: Duration) -> Self {
        self.shared.state.lock().delays.insert(op, by);
        self
    }

    /// Refuse the next `times` resumed sessions as expired
    pub fn refuse_sessions(self, times: usize) -> Self {
        self.shared.state.lock().refuse_sessions = times;
        self
    }

    pub fn launcher(&self) -> Arc<dyn DriverLauncher> {
        Arc::new(self.clone())
    }

    /// Every driver call so far, in order
    pub fn journal(&self) -> Vec<&'static str> {
        self.shared.journal.lock().clone()
    }

    pub fn calls(&self, op: &str) -> usize {
        self.shared.journal.lock().iter().filter(|c| **c == op).count()
    }

    /// Position of the first call of `op` in the journal
    pub fn first_call(&self, op: &str) -> Option<usize> {
        self.shared.journal.lock().iter().position(|c| *c == op)
    }

    pub fn launches(&self) -> usize {
        self.shared.launches.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.shared.logins.load(Ordering::SeqCst)
    }

    /// Forms that reached `fill_and_submit`
    pub fn submitted(&self) -> Vec<AppointmentFields> {
        self.shared.state.lock().submitted.clone()
    }

    async fn enter(&self, op: &'static str) -> Result<(), DriverError> {
        self.shared.journal.lock().push(op);
        let (delay, failure) = {
            let mut state = self.shared.state.lock();
            let delay = state.delays.get(op).copied();
            let failure = state.failures.get_mut(op).and_then(VecDeque::pop_front);
            (delay, failure)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        failure.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl DriverLauncher for ScriptedSalon {
    async fn launch(&self) -> Result<Box<dyn UiDriver>, DriverError> {
        self.shared.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl UiDriver for ScriptedSalon {
    async fn login(&self, credentials: &Credentials) -> Result<SessionToken, DriverError> {
        self.enter(LOGIN).await?;
        let n = self.shared.logins.fetch_add(1, Ordering::SeqCst) + 1;
        let state = self.shared.state.lock();
        match &state.credentials {
            Some(expected) if expected != credentials => {
                Err(DriverError::CredentialsRejected("invalid e-mail or password".into()))
            }
            _ => Ok(SessionToken::new(format!("session-{n}"))),
        }
    }

    async fn resume_session(&self, _session: &Session) -> Result<(), DriverError> {
        self.enter(RESUME_SESSION).await?;
        let mut state = self.shared.state.lock();
        if state.refuse_sessions > 0 {
            state.refuse_sessions -= 1;
            return Err(DriverError::CredentialsRejected("session expired".into()));
        }
        Ok(())
    }

    async fn open_schedule_view(&self, date: NaiveDate) -> Result<ViewHandle, DriverError> {
        self.enter(OPEN_SCHEDULE_VIEW).await?;
        Ok(ViewHandle {
            date,
            id: format!("view-{date}"),
        })
    }

    async fn professional_roster(&self, _view: &ViewHandle) -> Result<Vec<String>, DriverError> {
        self.enter(PROFESSIONAL_ROSTER).await?;
        Ok(self.shared.state.lock().roster.clone())
    }

    async fn column_events(
        &self,
        _view: &ViewHandle,
        column: usize,
    ) -> Result<Vec<RawEvent>, DriverError> {
        self.enter(COLUMN_EVENTS).await?;
        Ok(self
            .shared
            .state
            .lock()
            .events
            .get(&column)
            .cloned()
            .unwrap_or_default())
    }

    async fn open_booking_form(&self) -> Result<FormHandle, DriverError> {
        self.enter(OPEN_BOOKING_FORM).await?;
        Ok(FormHandle { id: "form".into() })
    }

    async fn search_clients(
        &self,
        _form: &FormHandle,
        name: &str,
    ) -> Result<Vec<ClientRef>, DriverError> {
        self.enter(SEARCH_CLIENTS).await?;
        let wanted = name.to_lowercase();
        Ok(self
            .shared
            .state
            .lock()
            .clients
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&wanted))
            .cloned()
            .collect())
    }

    async fn search_services(
        &self,
        _form: &FormHandle,
        name: &str,
    ) -> Result<Vec<ServiceRef>, DriverError> {
        self.enter(SEARCH_SERVICES).await?;
        let wanted = name.to_lowercase();
        Ok(self
            .shared
            .state
            .lock()
            .services
            .iter()
            .filter(|s| s.name.to_lowercase().contains(&wanted))
            .cloned()
            .collect())
    }

    async fn attach_service(
        &self,
        _form: &FormHandle,
        _service: &ServiceRef,
    ) -> Result<(), DriverError> {
        self.enter(ATTACH_SERVICE).await
    }

    async fn fill_and_submit(
        &self,
        _form: &FormHandle,
        fields: &AppointmentFields,
    ) -> Result<SubmissionOutcome, DriverError> {
        self.enter(FILL_AND_SUBMIT).await?;
        let mut state = self.shared.state.lock();
        state.submitted.push(fields.clone());
        Ok(state
            .outcome
            .clone()
            .unwrap_or_else(|| SubmissionOutcome::success("ok")))
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.enter(CLOSE).await
    }
}

/// Authenticator that counts calls and sleeps before answering
#[derive(Debug)]
pub struct CountingAuthenticator {
    calls: AtomicUsize,
    delay: Duration,
    fail_with: Option<BookingError>,
}

impl CountingAuthenticator {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            fail_with: None,
        })
    }

    pub fn failing(error: BookingError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail_with: Some(error),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for CountingAuthenticator {
    async fn authenticate(&self) -> Result<SessionToken, BookingError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(SessionToken::new(format!("token-{n}"))),
        }
    }
}
