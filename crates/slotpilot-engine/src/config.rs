//! Engine configuration
//!
//! Built once at process start and injected into the engine. Grid
//! granularity and business hours are plain settings here: deployments
//! disagree on them, so nothing in the engine hardcodes a value.

use crate::error::BookingError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use slotpilot_schedule::BusinessHours;
use std::fmt;
use std::time::Duration;

/// Login credentials for the remote scheduling application
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account e-mail
    pub email: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    #[inline]
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Both fields present
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Opening hours and slot grid
    pub business_hours: BusinessHours,
    /// Retry policy for transient UI failures
    pub retry: RetryPolicy,
    /// Per-attempt timeout for each external step, in milliseconds
    pub step_timeout_ms: u64,
    /// Wall-clock bound for a whole booking or availability run
    pub workflow_timeout_ms: u64,
    /// Local lifetime of a cached session, kept below the remote lifetime
    pub session_ttl_secs: u64,
    /// Subtracted from a remote-reported session expiry
    pub session_safety_margin_secs: u64,
    /// Maximum alternatives returned with `SlotUnavailable`
    pub suggestion_limit: usize,
    /// Require every grid slot covered by the booking to be free,
    /// not only the start slot
    pub require_full_duration: bool,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With business hours
    #[inline]
    #[must_use]
    pub fn with_business_hours(mut self, hours: BusinessHours) -> Self {
        self.business_hours = hours;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With per-step timeout
    #[inline]
    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout_ms = duration_ms(timeout);
        self
    }

    /// With workflow timeout
    #[inline]
    #[must_use]
    pub fn with_workflow_timeout(mut self, timeout: Duration) -> Self {
        self.workflow_timeout_ms = duration_ms(timeout);
        self
    }

    /// With session TTL
    #[inline]
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl_secs = ttl.as_secs();
        self
    }

    /// With full-duration slot check
    #[inline]
    #[must_use]
    pub fn with_full_duration_check(mut self, enabled: bool) -> Self {
        self.require_full_duration = enabled;
        self
    }

    /// Per-step timeout
    #[inline]
    #[must_use]
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    /// Workflow timeout
    #[inline]
    #[must_use]
    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_millis(self.workflow_timeout_ms)
    }

    /// Session TTL
    #[inline]
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Safety margin applied to remote session expiry
    #[inline]
    #[must_use]
    pub fn session_safety_margin(&self) -> Duration {
        Duration::from_secs(self.session_safety_margin_secs)
    }

    /// Validate all settings
    ///
    /// # Errors
    /// `BookingError::InvalidConfiguration` for the first invalid setting
    pub fn validate(&self) -> Result<(), BookingError> {
        self.business_hours.validate()?;
        self.retry.validate()?;
        if self.step_timeout_ms == 0 {
            return Err(BookingError::InvalidConfiguration(
                "step timeout must be positive".to_string(),
            ));
        }
        if self.workflow_timeout_ms < self.step_timeout_ms {
            return Err(BookingError::InvalidConfiguration(format!(
                "workflow timeout ({} ms) is shorter than one step ({} ms)",
                self.workflow_timeout_ms, self.step_timeout_ms
            )));
        }
        if self.session_ttl_secs == 0 {
            return Err(BookingError::InvalidConfiguration(
                "session TTL must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            business_hours: BusinessHours::default(),
            retry: RetryPolicy::default(),
            step_timeout_ms: 30_000,
            workflow_timeout_ms: 180_000,
            session_ttl_secs: 20 * 60,
            session_safety_margin_secs: 60,
            suggestion_limit: 5,
            require_full_duration: false,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotpilot_schedule::TimeOfDay;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.suggestion_limit, 5);
        assert_eq!(config.business_hours.granularity_minutes, 30);
    }

    #[test]
    fn builder_overrides() {
        let hours = BusinessHours::new(
            TimeOfDay::from_hm(14, 0).unwrap(),
            TimeOfDay::from_hm(20, 0).unwrap(),
            10,
        )
        .unwrap();
        let config = EngineConfig::new()
            .with_business_hours(hours)
            .with_step_timeout(Duration::from_secs(5))
            .with_workflow_timeout(Duration::from_secs(60));
        assert_eq!(config.business_hours, hours);
        assert_eq!(config.step_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inconsistent_timeouts() {
        let config = EngineConfig::new()
            .with_step_timeout(Duration::from_secs(10))
            .with_workflow_timeout(Duration::from_secs(1));
        assert!(matches!(
            config.validate(),
            Err(BookingError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn partial_toml_style_input_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"suggestion_limit": 3}"#).unwrap();
        assert_eq!(config.suggestion_limit, 3);
        assert_eq!(config.step_timeout_ms, 30_000);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("owner@example.com", "hunter2");
        let shown = format!("{creds:?}");
        assert!(shown.contains("owner@example.com"));
        assert!(!shown.contains("hunter2"));
    }
}
