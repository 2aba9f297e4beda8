//! # Command Executor
//!
//! Purpose: Run one request/response exchange at a time over a transport,
//! hiding a single connection loss behind one reconnect-and-retry.
//!
//! ## Design Principles
//! 1. **One Line In, One Line Out**: The protocol has no correlation IDs, so
//!    every exchange is a complete write followed by exactly one read.
//! 2. **Retry Once**: A transport failure closes the connection, reconnects,
//!    and repeats the exchange a single time. Parse failures never retry.
//! 3. **No Silent Truncation**: A batch yields exactly one line per command or
//!    fails.

use tracing::{debug, trace, warn};

use crate::error::{ClientError, ClientResult};
use crate::reconnect::Reconnector;
use crate::transport::Transport;

/// Executes command lines against a reconnecting transport.
pub struct CommandExecutor<T> {
    reconnector: Reconnector<T>,
}

impl<T: Transport> CommandExecutor<T> {
    pub fn new(reconnector: Reconnector<T>) -> Self {
        CommandExecutor { reconnector }
    }

    pub fn is_connected(&self) -> bool {
        self.reconnector.is_connected()
    }

    /// Sends `command` and returns the raw response line.
    pub fn execute(&mut self, command: &str) -> ClientResult<String> {
        ensure_single_line(command)?;
        debug!(verb = verb_of(command), "execute");
        self.reconnector.ensure_connected()?;

        let err = match self.round_trip(command) {
            Ok(line) => return Ok(line),
            Err(err) if err.is_transport() => err,
            Err(err) => return Err(err),
        };

        // The stream may still deliver a late reply; never reuse it.
        self.reconnector.mark_dead();
        if !self.reconnector.policy().auto_reconnect {
            return Err(surface(err, "connection lost"));
        }

        warn!(verb = verb_of(command), error = %err, "connection lost, retrying once");
        self.reconnector.reconnect()?;
        self.round_trip(command).map_err(|retry_err| {
            if retry_err.is_transport() {
                self.reconnector.mark_dead();
                surface(retry_err, "command failed after reconnect")
            } else {
                retry_err
            }
        })
    }

    /// Sends every line in one write and reads one response per line.
    ///
    /// Batches are not retried: after a failure it is unknown how many of the
    /// commands the server applied.
    pub fn execute_batch(&mut self, commands: &[String]) -> ClientResult<Vec<String>> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        for command in commands {
            ensure_single_line(command)?;
        }
        debug!(count = commands.len(), "execute batch");
        self.reconnector.ensure_connected()?;

        let payload_len = commands.iter().map(|c| c.len() + 1).sum();
        let mut payload = Vec::with_capacity(payload_len);
        for command in commands {
            payload.extend_from_slice(command.as_bytes());
            payload.push(b'\n');
        }

        let result = self.batch_round_trip(&payload, commands.len());
        if let Err(err) = &result {
            if err.is_transport() {
                self.reconnector.mark_dead();
            }
        }
        result.map_err(|err| {
            if err.is_transport() {
                surface(err, "batch interrupted")
            } else {
                err
            }
        })
    }

    /// Best-effort `QUIT` followed by closing the transport.
    pub fn shutdown(&mut self, quit_line: &str) {
        if self.reconnector.is_connected() {
            if let Err(err) = self.reconnector.transport_mut().write_line(quit_line) {
                debug!(error = %err, "quit not delivered");
            }
        }
        self.reconnector.mark_dead();
    }

    fn round_trip(&mut self, command: &str) -> ClientResult<String> {
        let transport = self.reconnector.transport_mut();
        transport.write_line(command)?;
        let line = transport.read_line()?;
        trace!(request = command, response = %line, "round trip");
        Ok(line)
    }

    fn batch_round_trip(&mut self, payload: &[u8], expected: usize) -> ClientResult<Vec<String>> {
        let transport = self.reconnector.transport_mut();
        transport.write_all(payload)?;
        let mut lines = Vec::with_capacity(expected);
        for _ in 0..expected {
            lines.push(transport.read_line()?);
        }
        Ok(lines)
    }
}

/// Final form of a transport error handed to callers.
fn surface(err: ClientError, context: &str) -> ClientError {
    match err {
        ClientError::Timeout(_) => err,
        other => ClientError::connection_caused_by(context, other),
    }
}

/// A second line would be answered separately and desync every later reply.
fn ensure_single_line(command: &str) -> ClientResult<()> {
    if command.contains(['\r', '\n']) {
        return Err(ClientError::InvalidArgument(format!(
            "command must be a single line: {command:?}"
        )));
    }
    Ok(())
}

fn verb_of(command: &str) -> &str {
    command.split(' ').next().unwrap_or_default()
}
