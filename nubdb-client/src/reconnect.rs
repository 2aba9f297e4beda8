//! # Reconnector
//!
//! Purpose: Keep a transport connected, re-establishing it with a bounded
//! number of attempts and linear backoff.
//!
//! ## Design Principles
//! 1. **Decorator Pattern**: Wraps any [`Transport`] without changing its API.
//! 2. **Clean Slate**: Stale handles are torn down before every new attempt.
//! 3. **Bounded Work**: At most `max_retries` connects per sequence.

use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::Transport;

/// Retry policy applied by the [`Reconnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub auto_reconnect: bool,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        RetryPolicy {
            auto_reconnect: config.auto_reconnect,
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
        }
    }

    /// Wait before the attempt following `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Owns a transport and its reconnect policy.
pub struct Reconnector<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> Reconnector<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Reconnector { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// No-op when connected; otherwise reconnects if the policy allows it.
    pub fn ensure_connected(&mut self) -> ClientResult<()> {
        if self.transport.is_connected() {
            return Ok(());
        }
        if !self.policy.auto_reconnect {
            return Err(ClientError::connection(format!(
                "not connected to {} and auto-reconnect is disabled",
                self.transport.peer()
            )));
        }
        self.reconnect()
    }

    /// Single connect attempt with no retries, used for eager construction.
    pub fn connect_once(&mut self) -> ClientResult<()> {
        self.transport.close();
        self.transport.connect()
    }

    /// Tears down the current connection and retries connecting.
    pub fn reconnect(&mut self) -> ClientResult<()> {
        self.transport.close();
        let peer = self.transport.peer();
        let max = self.policy.max_retries;
        let mut last_err = None;

        for attempt in 1..=max {
            match self.transport.connect() {
                Ok(()) => {
                    info!(%peer, attempt, "reconnected");
                    return Ok(());
                }
                Err(err) => {
                    warn!(%peer, attempt, max, error = %err, "reconnect attempt failed");
                    // A failed connect may leave partial state behind.
                    self.transport.close();
                    last_err = Some(err);
                    if attempt < max {
                        thread::sleep(self.policy.delay_after(attempt));
                    }
                }
            }
        }

        error!(%peer, attempts = max, "reconnect budget exhausted");
        let message = format!("could not reconnect to {peer} after {max} attempts");
        Err(match last_err {
            Some(err) => ClientError::connection_caused_by(message, err),
            None => ClientError::connection(message),
        })
    }

    /// Drops the connection, e.g. after an I/O failure left it unusable.
    pub fn mark_dead(&mut self) {
        self.transport.close();
    }
}
