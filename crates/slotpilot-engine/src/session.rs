//! Session manager
//!
//! Owns the only shared mutable state in the engine: the cached login
//! session. Lookups are cheap; a cache miss triggers at most one login no
//! matter how many tasks miss at the same time. Later callers wait on the
//! in-flight login and receive its result, success or failure. The login
//! runs on its own task, so a cancelled caller never strands it or its
//! driver.

use crate::config::{Credentials, EngineConfig};
use crate::driver::{DriverLauncher, SessionToken};
use crate::error::BookingError;
use crate::lease::DriverLease;
use crate::retry::{within, RetryPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Authenticated session with a conservative local expiry
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Credential handed to drivers
    pub token: String,
    /// Instant after which the session must not be used
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a session
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Whether the session may still be used at `now`
    #[inline]
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Storage for the cached session
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    /// Current session, expired or not
    fn get(&self) -> Option<Session>;

    /// Replace the current session
    fn put(&self, session: Session);

    /// Forget the current session
    fn clear(&self);
}

/// Process-local session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: RwLock<Option<Session>>,
}

impl InMemorySessionStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self) -> Option<Session> {
        self.inner.read().clone()
    }

    fn put(&self, session: Session) {
        *self.inner.write() = Some(session);
    }

    fn clear(&self) {
        *self.inner.write() = None;
    }
}

/// Performs one login against the remote system
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Log in once
    async fn authenticate(&self) -> Result<SessionToken, BookingError>;
}

/// Logs in with a dedicated, short-lived driver
pub struct DriverAuthenticator {
    launcher: Arc<dyn DriverLauncher>,
    credentials: Credentials,
}

impl DriverAuthenticator {
    /// Create new authenticator
    #[inline]
    #[must_use]
    pub fn new(launcher: Arc<dyn DriverLauncher>, credentials: Credentials) -> Self {
        Self {
            launcher,
            credentials,
        }
    }
}

#[async_trait]
impl Authenticator for DriverAuthenticator {
    async fn authenticate(&self) -> Result<SessionToken, BookingError> {
        let lease = DriverLease::acquire(self.launcher.as_ref()).await?;
        let result = lease
            .login(&self.credentials)
            .await
            .map_err(|e| BookingError::from_driver("login", e));
        lease.release().await;
        result
    }
}

/// Timing settings the manager copies out of `EngineConfig`
#[derive(Debug, Clone)]
struct SessionSettings {
    retry: RetryPolicy,
    step_timeout: Duration,
    ttl: Duration,
    safety_margin: Duration,
}

impl SessionSettings {
    fn session_from(&self, token: SessionToken, now: DateTime<Utc>) -> Session {
        let local_expiry = now + chrono_span(self.ttl);
        let expires_at = match token.remote_expires_at {
            Some(remote) => local_expiry.min(remote - chrono_span(self.safety_margin)),
            None => local_expiry,
        };
        if expires_at <= now {
            tracing::warn!("Remote session expires within the safety margin; it will not be reused");
        }
        Session::new(token.value, expires_at)
    }
}

fn chrono_span(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::weeks(52))
}

type LoginFuture = Shared<BoxFuture<'static, Result<Session, BookingError>>>;

struct InFlight {
    generation: u64,
    future: LoginFuture,
}

/// Cached, single-flight access to an authenticated session
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    authenticator: Arc<dyn Authenticator>,
    settings: SessionSettings,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    generation: AtomicU64,
}

impl SessionManager {
    /// Create new session manager
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        authenticator: Arc<dyn Authenticator>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            authenticator,
            settings: SessionSettings {
                retry: config.retry.clone(),
                step_timeout: config.step_timeout(),
                ttl: config.session_ttl(),
                safety_margin: config.session_safety_margin(),
            },
            in_flight: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    /// Manager that logs in through `launcher` and caches in memory
    #[must_use]
    pub fn with_driver_login(
        launcher: Arc<dyn DriverLauncher>,
        credentials: Credentials,
        config: &EngineConfig,
    ) -> Self {
        Self::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(DriverAuthenticator::new(launcher, credentials)),
            config,
        )
    }

    /// Return a valid session, logging in if needed
    ///
    /// # Errors
    /// - `BookingError::Authentication` when the credentials are rejected
    /// - `BookingError::Timeout` when the login step times out or transient
    ///   failures exhaust the retry budget
    pub async fn get_session(&self) -> Result<Session, BookingError> {
        if let Some(session) = self.cached() {
            tracing::debug!("Session cache hit");
            return Ok(session);
        }

        let future = {
            let mut slot = self.in_flight.lock();
            // A login may have finished between the first check and the lock.
            if let Some(session) = self.cached() {
                return Ok(session);
            }
            match slot.as_ref() {
                Some(flight) => {
                    tracing::debug!("Joining in-flight login");
                    flight.future.clone()
                }
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let future = self.spawn_login(generation);
                    *slot = Some(InFlight {
                        generation,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await
    }

    /// Drop the cached session
    pub fn invalidate(&self) {
        tracing::info!("Session invalidated");
        self.store.clear();
    }

    fn cached(&self) -> Option<Session> {
        self.store
            .get()
            .filter(|session| session.is_valid_at(Utc::now()))
    }

    /// Start a login that runs to completion even if every waiter goes away
    ///
    /// Called with the `in_flight` lock held; the task clears its own entry
    /// once the session is stored or the login has failed.
    fn spawn_login(&self, generation: u64) -> LoginFuture {
        let login = self.login_future();
        let in_flight = Arc::clone(&self.in_flight);
        let task = tokio::spawn(async move {
            let result = login.await;
            let mut slot = in_flight.lock();
            if slot.as_ref().is_some_and(|f| f.generation == generation) {
                *slot = None;
            }
            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(BookingError::ExternalSystem(format!("login task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }

    fn login_future(&self) -> BoxFuture<'static, Result<Session, BookingError>> {
        let authenticator = Arc::clone(&self.authenticator);
        let store = Arc::clone(&self.store);
        let settings = self.settings.clone();

        async move {
            tracing::info!("Authenticating against remote scheduler");
            let auth = authenticator.as_ref();
            let step_timeout = settings.step_timeout;
            let token = settings
                .retry
                .run("login", move || within("login", step_timeout, auth.authenticate()))
                .await
                .map_err(|e| {
                    tracing::error!("Authentication failed: {}", e);
                    e
                })?;

            let session = settings.session_from(token, Utc::now());
            store.put(session.clone());
            tracing::info!("Session established, valid until {}", session.expires_at);
            Ok(session)
        }
        .boxed()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("settings", &self.settings)
            .field("login_in_flight", &self.in_flight.lock().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct CountingAuth {
        calls: AtomicU32,
        delay: Duration,
        outcome: Result<&'static str, BookingError>,
    }

    impl CountingAuth {
        fn ok(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                delay,
                outcome: Ok("tok"),
            })
        }

        fn failing(error: BookingError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
                outcome: Err(error),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authenticator for CountingAuth {
        async fn authenticate(&self) -> Result<SessionToken, BookingError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            self.outcome
                .clone()
                .map(|prefix| SessionToken::new(format!("{prefix}-{n}")))
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::new().with_retry(RetryPolicy::new(3, Duration::from_millis(10), 2.0))
    }

    #[tokio::test]
    async fn cached_session_skips_login() {
        let valid = Session::new("cached", Utc::now() + chrono::Duration::minutes(5));
        let mut store = MockSessionStore::new();
        let expected = valid.clone();
        store.expect_get().returning(move || Some(expected.clone()));
        store.expect_put().never();

        let auth = CountingAuth::ok(Duration::ZERO);
        let manager = SessionManager::new(Arc::new(store), auth.clone(), &config());

        assert_eq!(manager.get_session().await.unwrap(), valid);
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn expired_session_triggers_one_login_and_put() {
        let stale = Session::new("stale", Utc::now() - chrono::Duration::minutes(1));
        let mut store = MockSessionStore::new();
        store.expect_get().returning(move || Some(stale.clone()));
        store
            .expect_put()
            .times(1)
            .withf(|s| s.token == "tok-1")
            .return_const(());

        let auth = CountingAuth::ok(Duration::ZERO);
        let manager = SessionManager::new(Arc::new(store), auth.clone(), &config());

        let session = manager.get_session().await.unwrap();
        assert_eq!(session.token, "tok-1");
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_cold_callers_share_one_login() {
        let auth = CountingAuth::ok(Duration::from_millis(200));
        let manager = Arc::new(SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            auth.clone(),
            &config(),
        ));

        let callers = (0..16).map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get_session().await })
        });
        let sessions: Vec<Session> = futures::future::join_all(callers)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(auth.calls(), 1);
        assert!(sessions.iter().all(|s| *s == sessions[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_credentials_are_not_retried() {
        let auth = CountingAuth::failing(BookingError::Authentication("bad password".into()));
        let manager = SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            auth.clone(),
            &config(),
        );

        let err = manager.get_session().await.unwrap_err();
        assert_eq!(err, BookingError::Authentication("bad password".into()));
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_login_failures_are_retried_then_time_out() {
        let auth = CountingAuth::failing(BookingError::TransientUi {
            step: "login".into(),
            message: "login form not visible".into(),
        });
        let manager = SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            auth.clone(),
            &config(),
        );

        let err = manager.get_session().await.unwrap_err();
        assert!(matches!(err, BookingError::Timeout { .. }));
        assert_eq!(auth.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_login_is_not_cached() {
        let auth = CountingAuth::failing(BookingError::Authentication("nope".into()));
        let manager = SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            auth.clone(),
            &config(),
        );

        assert!(manager.get_session().await.is_err());
        assert!(manager.get_session().await.is_err());
        assert_eq!(auth.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_login_still_fills_the_cache() {
        let auth = CountingAuth::ok(Duration::from_millis(500));
        let manager = SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            auth.clone(),
            &config(),
        );

        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), manager.get_session()).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(manager.in_flight.lock().is_none());
        assert_eq!(manager.get_session().await.unwrap().token, "tok-1");
        assert_eq!(auth.calls(), 1);
    }

    #[test]
    fn expiry_respects_remote_deadline() {
        let settings = SessionSettings {
            retry: RetryPolicy::none(),
            step_timeout: Duration::from_secs(1),
            ttl: Duration::from_secs(20 * 60),
            safety_margin: Duration::from_secs(60),
        };
        let now = Utc::now();

        let local_only = settings.session_from(SessionToken::new("a"), now);
        assert_eq!(local_only.expires_at, now + chrono::Duration::minutes(20));

        let remote = now + chrono::Duration::minutes(5);
        let capped = settings.session_from(SessionToken::new("b").expiring_at(remote), now);
        assert_eq!(capped.expires_at, remote - chrono::Duration::minutes(1));
    }

    #[tokio::test]
    async fn invalidate_forces_new_login() {
        let auth = CountingAuth::ok(Duration::ZERO);
        let manager = SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            auth.clone(),
            &config(),
        );

        let first = manager.get_session().await.unwrap();
        assert_eq!(manager.get_session().await.unwrap(), first);
        manager.invalidate();
        let second = manager.get_session().await.unwrap();
        assert_ne!(first.token, second.token);
        assert_eq!(auth.calls(), 2);
    }
}
