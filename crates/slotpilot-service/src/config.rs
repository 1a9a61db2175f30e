//! Service configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use slotpilot_engine::{Credentials, EngineConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// `PORT` overrides `server.port`
pub const ENV_PORT: &str = "PORT";
/// `SLOTPILOT_EMAIL` overrides `credentials.email`
pub const ENV_EMAIL: &str = "SLOTPILOT_EMAIL";
/// `SLOTPILOT_PASSWORD` overrides `credentials.password`
pub const ENV_PASSWORD: &str = "SLOTPILOT_PASSWORD";
/// `SLOTPILOT_SANDBOX` overrides `sandbox`
pub const ENV_SANDBOX: &str = "SLOTPILOT_SANDBOX";

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl ServerConfig {
    /// Socket address to bind
    ///
    /// # Errors
    /// When `host` is not an IP address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip = self
            .host
            .parse::<std::net::IpAddr>()
            .with_context(|| format!("invalid server host {:?}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener
    pub server: ServerConfig,
    /// Engine timings, retry and business hours
    pub engine: EngineConfig,
    /// Remote account
    pub credentials: Credentials,
    /// Professional used when a request names none
    pub default_professional: Option<String>,
    /// YAML sandbox salon to drive instead of a live site
    pub sandbox: Option<PathBuf>,
}

impl ServiceConfig {
    /// Load from `path` (if given) and the process environment
    ///
    /// # Errors
    /// Unreadable or malformed file, or an unparseable override
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML file
    ///
    /// # Errors
    /// Unreadable or malformed file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Apply overrides from `lookup`
    ///
    /// # Errors
    /// When `PORT` is not a valid port number
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("{ENV_PORT}={port:?} is not a port number"))?;
        }
        if let Some(email) = lookup(ENV_EMAIL) {
            self.credentials.email = email;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.credentials.password = password;
        }
        if let Some(sandbox) = lookup(ENV_SANDBOX) {
            self.sandbox = Some(PathBuf::from(sandbox));
        }
        Ok(())
    }

    /// Check everything needed to start
    ///
    /// # Errors
    /// Invalid engine settings or incomplete credentials
    pub fn validate(&self) -> Result<()> {
        self.engine
            .validate()
            .context("invalid engine configuration")?;
        if !self.credentials.is_complete() {
            bail!("credentials are incomplete; set {ENV_EMAIL} and {ENV_PASSWORD}");
        }
        Ok(())
    }
}
