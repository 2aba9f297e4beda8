//! # Transports
//!
//! Purpose: Own one line-oriented stream to the server and expose raw
//! write/read-line primitives to the executor.
//!
//! ## Design Principles
//! 1. **Strategy Pattern**: The executor is generic over [`Transport`], so the
//!    TCP socket and the legacy subprocess pipe share one execution contract.
//! 2. **Exclusive Ownership**: A transport owns its handles; `close` drops them
//!    and is a no-op when already closed.
//! 3. **RAII Cleanup**: Implementations release handles in `Drop` as well.

mod process;
mod tcp;

#[cfg(test)]
pub(crate) mod mock;

pub use process::ProcessTransport;
pub use tcp::TcpTransport;

use crate::error::ClientResult;

/// A line-oriented connection the executor can drive.
pub trait Transport: Send {
    /// Opens the connection. Callers close any previous one first.
    fn connect(&mut self) -> ClientResult<()>;

    /// Releases all handles. Safe to call when disconnected.
    fn close(&mut self);

    /// Whether handles are currently held.
    fn is_connected(&self) -> bool;

    /// Writes `payload` as one contiguous write and flushes.
    fn write_all(&mut self, payload: &[u8]) -> ClientResult<()>;

    /// Reads one response line without its terminator.
    ///
    /// Fails with `ConnectionClosed` when the peer closes the stream.
    fn read_line(&mut self) -> ClientResult<String>;

    /// Human-readable endpoint for log lines.
    fn peer(&self) -> String;

    /// Writes `line` followed by `\n`.
    fn write_line(&mut self, line: &str) -> ClientResult<()> {
        let mut payload = Vec::with_capacity(line.len() + 1);
        payload.extend_from_slice(line.as_bytes());
        payload.push(b'\n');
        self.write_all(&payload)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self) -> ClientResult<()> {
        (**self).connect()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn write_all(&mut self, payload: &[u8]) -> ClientResult<()> {
        (**self).write_all(payload)
    }

    fn read_line(&mut self) -> ClientResult<String> {
        (**self).read_line()
    }

    fn peer(&self) -> String {
        (**self).peer()
    }

    fn write_line(&mut self, line: &str) -> ClientResult<()> {
        (**self).write_line(line)
    }
}

/// Strips the trailing `\n` / `\r\n` from a complete line.
///
/// Returns `None` when the buffer holds a partial line cut off by EOF.
pub(crate) fn take_complete_line(mut buf: String) -> Option<String> {
    if !buf.ends_with('\n') {
        return None;
    }
    buf.pop();
    if buf.ends_with('\r') {
        buf.pop();
    }
    Some(buf)
}
