//! Sandbox salon
//!
//! An in-memory stand-in for the remote scheduling site, loaded from YAML.
//! It speaks the same driver traits as a browser driver, so the service
//! and CLI run end to end without a live account. Confirmed bookings are
//! written back into the schedule, so later checks see them.
//!
//! ```yaml
//! credentials: { email: owner@salon.test, password: s3cret }
//! professionals: [Ana Souza, Bruno Oliveira]
//! schedule:
//!   "2025-03-14":
//!     Ana Souza:
//!       - title: "10:00 – 11:00 : Carlos"
//!       - { title: "13:00 – 14:00", break: true }
//! clients: [{ id: c1, name: Carlos Lima }]
//! services: [{ id: s1, name: Corte }]
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use slotpilot_engine::{
    parse_event, AppointmentFields, ClientRef, Credentials, DriverError, DriverLauncher,
    FormHandle, RawEvent, ServiceRef, Session, SessionToken, SubmissionOutcome, UiDriver,
    ViewHandle,
};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Event as written in the sandbox file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxEvent {
    /// Calendar title
    pub title: String,
    /// Blocked time
    #[serde(default, rename = "break")]
    pub is_break: bool,
}

impl From<&SandboxEvent> for RawEvent {
    fn from(event: &SandboxEvent) -> Self {
        Self {
            title: event.title.clone(),
            is_break: event.is_break,
        }
    }
}

/// Sandbox file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxData {
    /// Accepted login
    pub credentials: Credentials,
    /// Column order of the calendar
    pub professionals: Vec<String>,
    /// Events by date, then professional
    pub schedule: BTreeMap<NaiveDate, BTreeMap<String, Vec<SandboxEvent>>>,
    /// Client records
    pub clients: Vec<ClientRef>,
    /// Service records
    pub services: Vec<ServiceRef>,
}

#[derive(Debug, Default)]
struct SalonState {
    data: RwLock<SandboxData>,
    sessions: Mutex<HashSet<String>>,
    counter: AtomicU64,
}

impl SalonState {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{n}")
    }
}

/// Shared sandbox salon; clones see the same schedule
#[derive(Debug, Clone, Default)]
pub struct SandboxSalon {
    state: Arc<SalonState>,
}

impl SandboxSalon {
    /// Create from parsed data
    #[must_use]
    pub fn new(data: SandboxData) -> Self {
        Self {
            state: Arc::new(SalonState {
                data: RwLock::new(data),
                ..SalonState::default()
            }),
        }
    }

    /// Parse YAML text
    ///
    /// # Errors
    /// Malformed YAML
    pub fn from_yaml(text: &str) -> Result<Self> {
        let data: SandboxData = serde_yaml::from_str(text).context("parsing sandbox YAML")?;
        Ok(Self::new(data))
    }

    /// Load a YAML file
    ///
    /// # Errors
    /// Unreadable or malformed file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading sandbox file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("loading sandbox {}", path.display()))
    }

    /// Current contents, including bookings made so far
    #[must_use]
    pub fn snapshot(&self) -> SandboxData {
        self.state.data.read().clone()
    }
}

#[async_trait]
impl DriverLauncher for SandboxSalon {
    async fn launch(&self) -> Result<Box<dyn UiDriver>, DriverError> {
        Ok(Box::new(SandboxDriver {
            salon: Arc::clone(&self.state),
            session: Mutex::new(None),
        }))
    }
}

/// One "browser" on the sandbox salon
#[derive(Debug)]
struct SandboxDriver {
    salon: Arc<SalonState>,
    session: Mutex<Option<String>>,
}

impl SandboxDriver {
    fn ensure_session(&self) -> Result<(), DriverError> {
        let current = self.session.lock().clone();
        match current {
            Some(token) if self.salon.sessions.lock().contains(&token) => Ok(()),
            _ => Err(DriverError::Failed("redirected to login page".to_string())),
        }
    }

    fn professional_at(&self, column: usize) -> Result<String, DriverError> {
        self.salon
            .data
            .read()
            .professionals
            .get(column)
            .cloned()
            .ok_or_else(|| DriverError::Failed(format!("no calendar column {column}")))
    }
}

fn search<T: Clone>(records: &[T], name: &str, display: impl Fn(&T) -> &str) -> Vec<T> {
    let wanted = name.trim().to_lowercase();
    records
        .iter()
        .filter(|r| display(r).to_lowercase().contains(&wanted))
        .cloned()
        .collect()
}

#[async_trait]
impl UiDriver for SandboxDriver {
    async fn login(&self, credentials: &Credentials) -> Result<SessionToken, DriverError> {
        if self.salon.data.read().credentials != *credentials {
            return Err(DriverError::CredentialsRejected(
                "E-mail ou senha inválidos".to_string(),
            ));
        }
        let token = self.salon.next_id("sandbox-session");
        self.salon.sessions.lock().insert(token.clone());
        *self.session.lock() = Some(token.clone());
        Ok(SessionToken::new(token))
    }

    async fn resume_session(&self, session: &Session) -> Result<(), DriverError> {
        if !self.salon.sessions.lock().contains(&session.token) {
            return Err(DriverError::CredentialsRejected("session expired".to_string()));
        }
        *self.session.lock() = Some(session.token.clone());
        Ok(())
    }

    async fn open_schedule_view(&self, date: NaiveDate) -> Result<ViewHandle, DriverError> {
        self.ensure_session()?;
        Ok(ViewHandle {
            date,
            id: format!("agenda-{date}"),
        })
    }

    async fn professional_roster(&self, _view: &ViewHandle) -> Result<Vec<String>, DriverError> {
        self.ensure_session()?;
        Ok(self.salon.data.read().professionals.clone())
    }

    async fn column_events(
        &self,
        view: &ViewHandle,
        column: usize,
    ) -> Result<Vec<RawEvent>, DriverError> {
        self.ensure_session()?;
        let professional = self.professional_at(column)?;
        let data = self.salon.data.read();
        Ok(data
            .schedule
            .get(&view.date)
            .and_then(|day| day.get(&professional))
            .map(|events| events.iter().map(RawEvent::from).collect())
            .unwrap_or_default())
    }

    async fn open_booking_form(&self) -> Result<FormHandle, DriverError> {
        self.ensure_session()?;
        Ok(FormHandle {
            id: self.salon.next_id("form"),
        })
    }

    async fn search_clients(
        &self,
        _form: &FormHandle,
        name: &str,
    ) -> Result<Vec<ClientRef>, DriverError> {
        self.ensure_session()?;
        Ok(search(&self.salon.data.read().clients, name, |c| c.name.as_str()))
    }

    async fn search_services(
        &self,
        _form: &FormHandle,
        name: &str,
    ) -> Result<Vec<ServiceRef>, DriverError> {
        self.ensure_session()?;
        Ok(search(&self.salon.data.read().services, name, |s| s.name.as_str()))
    }

    async fn attach_service(
        &self,
        _form: &FormHandle,
        service: &ServiceRef,
    ) -> Result<(), DriverError> {
        self.ensure_session()?;
        if self.salon.data.read().services.iter().any(|s| s.id == service.id) {
            Ok(())
        } else {
            Err(DriverError::Failed(format!("unknown service {}", service.id)))
        }
    }

    async fn fill_and_submit(
        &self,
        _form: &FormHandle,
        fields: &AppointmentFields,
    ) -> Result<SubmissionOutcome, DriverError> {
        self.ensure_session()?;
        let mut data = self.salon.data.write();
        let day = data
            .schedule
            .entry(fields.date)
            .or_default()
            .entry(fields.professional.clone())
            .or_default();

        let clash = day
            .iter()
            .filter_map(|e| parse_event(&RawEvent::from(e)))
            .any(|busy| busy.start < fields.end_time && fields.start_time < busy.end);
        if clash {
            return Ok(SubmissionOutcome::error(
                "Já existe um agendamento neste horário",
            ));
        }

        day.push(SandboxEvent {
            title: format!(
                "{} – {} : {}",
                fields.start_time, fields.end_time, fields.client.name
            ),
            is_break: false,
        });
        drop(data);

        Ok(SubmissionOutcome::success("Agendamento realizado com sucesso")
            .with_reference(self.salon.next_id("SBX")))
    }

    async fn close(&self) -> Result<(), DriverError> {
        *self.session.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotpilot_schedule::TimeOfDay;

    const SALON: &str = r#"
credentials: { email: owner@salon.test, password: s3cret }
professionals: [Ana Souza, Bruno Oliveira]
schedule:
  "2025-03-14":
    Ana Souza:
      - title: "10:00 – 11:00 : Maria"
      - { title: "13:00 – 14:00", break: true }
clients:
  - { id: c1, name: Carlos Lima }
services:
  - { id: s1, name: Corte }
"#;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    async fn logged_in(salon: &SandboxSalon) -> Box<dyn UiDriver> {
        let driver = salon.launch().await.unwrap();
        driver
            .login(&Credentials::new("owner@salon.test", "s3cret"))
            .await
            .unwrap();
        driver
    }

    #[test]
    fn parses_yaml() {
        let salon = SandboxSalon::from_yaml(SALON).unwrap();
        let data = salon.snapshot();
        assert_eq!(data.professionals.len(), 2);
        let events = &data.schedule[&date()]["Ana Souza"];
        assert_eq!(events.len(), 2);
        assert!(events[1].is_break);
    }

    #[tokio::test]
    async fn rejects_wrong_password() {
        let salon = SandboxSalon::from_yaml(SALON).unwrap();
        let driver = salon.launch().await.unwrap();
        let err = driver
            .login(&Credentials::new("owner@salon.test", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::CredentialsRejected(_)));
    }

    #[tokio::test]
    async fn requires_session() {
        let salon = SandboxSalon::from_yaml(SALON).unwrap();
        let driver = salon.launch().await.unwrap();
        assert!(driver.open_schedule_view(date()).await.is_err());
    }

    #[tokio::test]
    async fn session_carries_over_to_new_driver() {
        let salon = SandboxSalon::from_yaml(SALON).unwrap();
        let first = salon.launch().await.unwrap();
        let token = first
            .login(&Credentials::new("owner@salon.test", "s3cret"))
            .await
            .unwrap();

        let second = salon.launch().await.unwrap();
        let session = Session::new(token.value, chrono::Utc::now() + chrono::Duration::minutes(5));
        second.resume_session(&session).await.unwrap();
        let view = second.open_schedule_view(date()).await.unwrap();
        let events = second.column_events(&view, 0).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn booking_is_written_back_and_clashes_are_rejected() {
        let salon = SandboxSalon::from_yaml(SALON).unwrap();
        let driver = logged_in(&salon).await;
        let form = driver.open_booking_form().await.unwrap();
        let client = driver.search_clients(&form, "carlos").await.unwrap().remove(0);

        let mut fields = AppointmentFields {
            client,
            professional: "Ana Souza".into(),
            date: date(),
            start_time: t("11:00"),
            end_time: t("12:00"),
            services: vec![],
        };
        let outcome = driver.fill_and_submit(&form, &fields).await.unwrap();
        assert_eq!(outcome.signal, slotpilot_engine::ConfirmationSignal::Success);
        assert!(outcome.reference.is_some());

        let snapshot = salon.snapshot();
        let events = &snapshot.schedule[&date()]["Ana Souza"];
        assert_eq!(events.last().unwrap().title, "11:00 – 12:00 : Carlos Lima");

        fields.start_time = t("11:30");
        fields.end_time = t("12:30");
        let clash = driver.fill_and_submit(&form, &fields).await.unwrap();
        assert_eq!(clash.signal, slotpilot_engine::ConfirmationSignal::Error);
    }
}
