//! Configuration management.
//!
//! Two pieces of configuration feed the handshake:
//! - [`ServerAddress`]: where the session server listens, discovered from
//!   the `NSM_URL` environment variable
//! - [`ClientSettings`]: handshake timeouts, from defaults, a TOML file,
//!   or environment variables

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{NsmError, Result};
use crate::protocol::NSM_URL_ENV;

/// Session server address, e.g. `osc.udp://studio:15432/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    url: String,
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Parse a URL-shaped address. Host and an explicit port are required.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim())?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| NsmError::Configuration(format!("No host in server URL: {raw}")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url
            .port()
            .ok_or_else(|| NsmError::Configuration(format!("No port in server URL: {raw}")))?;

        Ok(Self {
            url: raw.trim().to_string(),
            host,
            port,
        })
    }

    /// Read the address from `NSM_URL`
    pub fn from_env() -> Result<Self> {
        Self::from_value(std::env::var(NSM_URL_ENV).ok())
    }

    /// Parse an optional raw value, as read from the environment
    pub fn from_value(value: Option<String>) -> Result<Self> {
        match value {
            Some(raw) => Self::parse(&raw),
            None => Err(NsmError::Configuration(format!("{NSM_URL_ENV} not defined"))),
        }
    }

    /// Host name or IP literal
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The URL as given
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolve to a socket address, preferring IPv4
    pub async fn resolve(&self) -> Result<SocketAddr> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| NsmError::Connection(format!("Failed to resolve {}: {e}", self.host)))?
            .collect();

        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| NsmError::Connection(format!("No address for {}", self.host)))
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Handshake timing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Upper bound for the transport to become ready
    pub connect_timeout_ms: u64,

    /// Readiness polling interval
    pub poll_interval_ms: u64,

    /// Upper bound for the announce reply
    pub announce_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            poll_interval_ms: 100,
            announce_timeout_ms: 10_000,
        }
    }
}

impl ClientSettings {
    /// Load settings from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            NsmError::Configuration(format!("Failed to read {}: {e}", path.display()))
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// Default settings overridden by environment variables
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `NSM_CONNECT_TIMEOUT_MS`, `NSM_POLL_INTERVAL_MS` and
    /// `NSM_ANNOUNCE_TIMEOUT_MS` from `lookup`. Unparseable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(ms) = read("NSM_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = ms;
        }
        if let Some(ms) = read("NSM_POLL_INTERVAL_MS") {
            self.poll_interval_ms = ms.max(1);
        }
        if let Some(ms) = read("NSM_ANNOUNCE_TIMEOUT_MS") {
            self.announce_timeout_ms = ms;
        }
        self
    }

    /// `$XDG_CONFIG_HOME/nsm-client/client.toml` or platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nsm-client").join("client.toml"))
    }

    /// Layered load: defaults, then the file (explicit path, or the default
    /// path when it exists), then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None => Self::default(),
            },
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Transport readiness bound
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Readiness polling interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Announce reply bound
    pub fn announce_timeout(&self) -> Duration {
        Duration::from_millis(self.announce_timeout_ms)
    }

    /// Set both handshake bounds
    pub fn with_timeouts(mut self, connect: Duration, announce: Duration) -> Self {
        self.connect_timeout_ms = connect.as_millis() as u64;
        self.announce_timeout_ms = announce.as_millis() as u64;
        self
    }
}
