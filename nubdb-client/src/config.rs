//! # Client Configuration
//!
//! Purpose: Resolve connection settings from explicit builder arguments, then
//! environment overrides, then built-in defaults.

use std::env;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default server port.
pub const DEFAULT_PORT: u16 = 6379;
/// Default per-operation I/O timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of reconnect attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default backoff unit; attempt `n` waits `n * base`.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Environment variable overriding the host.
pub const HOST_ENV: &str = "NUBDB_HOST";
/// Environment variable overriding the port.
pub const PORT_ENV: &str = "NUBDB_PORT";

/// Immutable connection settings for a [`NubClient`](crate::NubClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server host name or IP literal.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// Connect, read and write deadline, applied per operation.
    pub timeout: Duration,
    /// Reconnect transparently when the connection is lost.
    pub auto_reconnect: bool,
    /// Maximum connect attempts per reconnect sequence.
    pub max_retries: u32,
    /// Linear backoff unit between reconnect attempts.
    pub retry_base_delay: Duration,
    /// Defer connecting until the first command.
    pub lazy_connect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            auto_reconnect: true,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            lazy_connect: false,
        }
    }
}

impl ClientConfig {
    /// Creates a new config builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Defaults with `NUBDB_HOST` / `NUBDB_PORT` applied.
    pub fn from_env() -> ClientResult<Self> {
        Self::builder().build()
    }

    /// Renders `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ClientConfig`].
///
/// Host and port left unset fall back to the environment, then to defaults.
#[derive(Debug, Default, Clone)]
pub struct ClientConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    timeout: Option<Duration>,
    auto_reconnect: Option<bool>,
    max_retries: Option<u32>,
    retry_base_delay: Option<Duration>,
    lazy_connect: bool,
}

impl ClientConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = Some(enabled);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Skip the eager connect performed at construction.
    pub fn lazy_connect(mut self, lazy: bool) -> Self {
        self.lazy_connect = lazy;
        self
    }

    /// Resolves the config against the process environment.
    pub fn build(self) -> ClientResult<ClientConfig> {
        self.build_with(|name| env::var(name).ok())
    }

    /// Resolves the config against an explicit variable lookup.
    pub fn build_with<F>(self, lookup: F) -> ClientResult<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = match self.host {
            Some(host) => host,
            None => lookup(HOST_ENV)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        };

        let port = match self.port {
            Some(port) => port,
            None => match lookup(PORT_ENV) {
                Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                    ClientError::InvalidConfig(format!("{PORT_ENV}={raw:?} is not a valid port"))
                })?,
                None => DEFAULT_PORT,
            },
        };

        Ok(ClientConfig {
            host,
            port,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            auto_reconnect: self.auto_reconnect.unwrap_or(true),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_base_delay: self.retry_base_delay.unwrap_or(DEFAULT_RETRY_BASE_DELAY),
            lazy_connect: self.lazy_connect,
        })
    }
}
