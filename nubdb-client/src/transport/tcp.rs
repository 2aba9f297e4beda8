//! # TCP Transport
//!
//! Purpose: One blocking TCP connection with a buffered line reader, the
//! primary way to reach a NubDB server.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{classify_io, ClientError, ClientResult};
use crate::transport::{take_complete_line, Transport};

/// TCP transport to a fixed `host:port`.
///
/// The socket is opened by [`Transport::connect`] and dropped by
/// [`Transport::close`] or when the transport goes out of scope.
#[derive(Debug)]
pub struct TcpTransport {
    host: String,
    port: u16,
    timeout: Option<Duration>,
    conn: Option<Connection>,
}

/// Live socket state. Only exists while connected.
#[derive(Debug)]
struct Connection {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
}

impl TcpTransport {
    /// Creates a disconnected transport. A zero timeout disables deadlines.
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        TcpTransport {
            host: host.into(),
            port,
            timeout: (!timeout.is_zero()).then_some(timeout),
            conn: None,
        }
    }

    /// Creates a disconnected transport for the configured endpoint.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.host.clone(), config.port, config.timeout)
    }

    fn resolve(&self) -> ClientResult<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|err| {
                ClientError::connection_caused_by(
                    format!("could not resolve host '{}'", self.host),
                    err,
                )
            })?
            .collect();
        if addrs.is_empty() {
            return Err(ClientError::connection(format!(
                "host '{}' resolved to no addresses",
                self.host
            )));
        }
        Ok(addrs)
    }

    fn open(&self, addr: &SocketAddr) -> std::io::Result<Connection> {
        let stream = match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        // On any error below the stream is dropped, so nothing leaks.
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;
        Ok(Connection {
            reader: BufReader::new(stream),
        })
    }

    fn conn_mut(&mut self) -> ClientResult<&mut Connection> {
        self.conn.as_mut().ok_or(ClientError::ConnectionClosed)
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> ClientResult<()> {
        self.close();
        let mut last_err = None;
        for addr in self.resolve()? {
            match self.open(&addr) {
                Ok(conn) => {
                    self.conn = Some(conn);
                    info!(peer = %self.peer(), %addr, "connected");
                    return Ok(());
                }
                Err(err) => {
                    debug!(%addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        let peer = self.peer();
        match last_err {
            Some(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                ) =>
            {
                Err(ClientError::Timeout(format!("connecting to {peer}")))
            }
            Some(err) => Err(ClientError::connection_caused_by(
                format!("could not connect to {peer}"),
                err,
            )),
            None => Err(ClientError::connection(format!("could not connect to {peer}"))),
        }
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Best effort; the socket is released when `conn` drops either way.
            let _ = conn.reader.get_ref().shutdown(Shutdown::Both);
            debug!(peer = %self.peer(), "socket closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn write_all(&mut self, payload: &[u8]) -> ClientResult<()> {
        let stream = self.conn_mut()?.reader.get_mut();
        stream
            .write_all(payload)
            .and_then(|()| stream.flush())
            .map_err(|err| classify_io(err, "sending command"))
    }

    fn read_line(&mut self) -> ClientResult<String> {
        let conn = self.conn_mut()?;
        let mut buf = String::with_capacity(64);
        match conn.reader.read_line(&mut buf) {
            Ok(0) => Err(ClientError::ConnectionClosed),
            Ok(_) => take_complete_line(buf).ok_or(ClientError::ConnectionClosed),
            Err(err) => Err(classify_io(err, "waiting for response")),
        }
    }

    fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
