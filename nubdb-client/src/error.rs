//! # Client Errors
//!
//! Purpose: One error taxonomy for every layer of the client, from socket
//! faults up to responses that do not match a command's grammar.
//!
//! ## Design Principles
//! 1. **Layered Kinds**: Transport faults (`ConnectionClosed`, `Io`, `Timeout`)
//!    are distinguishable from parse faults (`Command`) so only the former
//!    are retried.
//! 2. **Cause Chaining**: Reconnect failures keep the last attempt's error as
//!    their `source()`.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// Result type for the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The connection could not be established or re-established.
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// No connect or response within the configured deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The server answered, but not in the form the command expects.
    #[error("{verb} failed: unexpected response {response:?}")]
    Command { verb: &'static str, response: String },

    /// Peer closed the stream (zero-length read).
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Other socket-level failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A key or value cannot be encoded as a single protocol line.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An environment override could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    pub(crate) fn connection(message: impl Into<String>) -> Self {
        ClientError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn connection_caused_by(
        message: impl Into<String>,
        cause: impl StdError + Send + Sync + 'static,
    ) -> Self {
        ClientError::Connection {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// True for failures of the stream itself, which a reconnect may fix.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionClosed | ClientError::Io(_) | ClientError::Timeout(_)
        )
    }

    /// True when a deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }
}

/// Maps a socket error raised while a deadline was armed.
///
/// Blocking sockets report an expired read timeout as `WouldBlock` on Unix and
/// `TimedOut` on Windows.
pub(crate) fn classify_io(err: io::Error, context: &str) -> ClientError {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            ClientError::Timeout(context.to_string())
        }
        io::ErrorKind::UnexpectedEof => ClientError::ConnectionClosed,
        _ => ClientError::Io(err),
    }
}
