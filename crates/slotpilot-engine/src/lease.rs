//! Scoped ownership of a driver instance
//!
//! A lease owns exactly one launched driver. `release` closes it; a lease
//! dropped without release (cancelled task, elapsed workflow timeout)
//! schedules the close on the current runtime instead.

use crate::driver::{DriverLauncher, UiDriver};
use crate::error::BookingError;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

/// Exclusively owned driver instance
pub struct DriverLease {
    id: Uuid,
    driver: Option<Arc<dyn UiDriver>>,
}

impl DriverLease {
    /// Launch a fresh driver
    ///
    /// # Errors
    /// Launch failures mapped through `BookingError::from_driver`
    pub async fn acquire(launcher: &dyn DriverLauncher) -> Result<Self, BookingError> {
        let driver = launcher
            .launch()
            .await
            .map_err(|e| BookingError::from_driver("launch", e))?;
        let lease = Self {
            id: Uuid::new_v4(),
            driver: Some(Arc::from(driver)),
        };
        tracing::debug!("Driver lease {} acquired", lease.id);
        Ok(lease)
    }

    /// Lease identifier, for log correlation
    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Close the driver now
    ///
    /// Close failures are logged, never returned: the workflow outcome is
    /// already decided when this runs.
    pub async fn release(mut self) {
        if let Some(driver) = self.driver.take() {
            match driver.close().await {
                Ok(()) => tracing::debug!("Driver lease {} released", self.id),
                Err(e) => tracing::warn!("Driver lease {} close failed: {}", self.id, e),
            }
        }
    }
}

impl Deref for DriverLease {
    type Target = dyn UiDriver;

    fn deref(&self) -> &Self::Target {
        match &self.driver {
            Some(driver) => driver.as_ref(),
            // `driver` is only taken by `release(self)` and `drop`.
            None => unreachable!("driver lease used after release"),
        }
    }
}

impl Drop for DriverLease {
    fn drop(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("Driver lease {} dropped unreleased; closing in background", id);
                handle.spawn(async move {
                    if let Err(e) = driver.close().await {
                        tracing::warn!("Driver lease {} background close failed: {}", id, e);
                    }
                });
            }
            Err(_) => tracing::warn!("Driver lease {} dropped outside a runtime; not closed", id),
        }
    }
}

impl std::fmt::Debug for DriverLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverLease")
            .field("id", &self.id)
            .field("released", &self.driver.is_none())
            .finish()
    }
}
