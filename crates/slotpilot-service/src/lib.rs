//! slotpilot service
//!
//! Service boundary around the booking engine: JSON contracts, HTTP routes,
//! configuration loading, tracing bootstrap and the sandbox salon driver.

#![warn(unreachable_pub)]

pub mod config;
pub mod dto;
pub mod routes;
pub mod sandbox;

pub use config::{ServerConfig, ServiceConfig};
pub use routes::{routes, status_for, AppState};
pub use sandbox::{SandboxData, SandboxSalon};

use anyhow::{bail, Context, Result};
use slotpilot_engine::{BookingEngine, DriverLauncher, SessionManager};
use std::sync::Arc;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,slotpilot=debug";

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over [`DEFAULT_LOG_FILTER`].
pub fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    let installed = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(env_filter)
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Driver launcher for `config`
///
/// # Errors
/// No sandbox configured, or the sandbox file fails to load
pub fn launcher_for(config: &ServiceConfig) -> Result<Arc<dyn DriverLauncher>> {
    let Some(path) = &config.sandbox else {
        bail!("no driver configured; set `sandbox` or SLOTPILOT_SANDBOX to a salon YAML file");
    };
    let salon = SandboxSalon::load(path)?;
    tracing::info!("Using sandbox salon from {}", path.display());
    Ok(Arc::new(salon))
}

/// Engine wired to `launcher` with the configured credentials
///
/// # Errors
/// Invalid configuration
pub fn build_engine(
    config: &ServiceConfig,
    launcher: Arc<dyn DriverLauncher>,
) -> Result<BookingEngine> {
    config.validate()?;
    let sessions = Arc::new(SessionManager::with_driver_login(
        Arc::clone(&launcher),
        config.credentials.clone(),
        &config.engine,
    ));
    BookingEngine::new(launcher, sessions, config.engine.clone()).context("building engine")
}

/// Serve HTTP until the process is stopped
///
/// # Errors
/// Invalid configuration or bind address
pub async fn serve(config: ServiceConfig) -> Result<()> {
    let launcher = launcher_for(&config)?;
    let engine = Arc::new(build_engine(&config, launcher)?);
    let addr = config.server.socket_addr()?;

    let state = AppState::new(engine, config.default_professional.clone());
    tracing::info!("slotpilot listening on http://{}", addr);
    warp::serve(routes(state)).run(addr).await;
    Ok(())
}
