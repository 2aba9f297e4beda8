//! # Synchronous Client API
//!
//! Purpose: Expose a compact, blocking API for issuing NubDB commands over a
//! single connection.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `NubClient` hides reconnection and protocol details.
//! 2. **Serialized Access**: One mutex guards the write+read critical section,
//!    since the protocol cannot match replies to concurrent requests.
//! 3. **Explicit Ownership**: No global client; callers construct and share it.
//! 4. **RAII Shutdown**: Dropping the client closes the connection.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use crate::batch::Batch;
use crate::codec::{self, Verb};
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::executor::CommandExecutor;
use crate::reconnect::{Reconnector, RetryPolicy};
use crate::transport::{TcpTransport, Transport};

/// Blocking NubDB client over one connection.
///
/// All methods take `&self`; wrap the client in an `Arc` to share it between
/// threads. Commands from different threads are executed one at a time.
pub struct NubClient<T: Transport = TcpTransport> {
    config: ClientConfig,
    executor: Mutex<CommandExecutor<T>>,
}

impl NubClient<TcpTransport> {
    /// Connects using defaults plus `NUBDB_HOST` / `NUBDB_PORT` overrides.
    pub fn connect() -> ClientResult<Self> {
        Self::with_config(ClientConfig::from_env()?)
    }

    /// Connects to an explicit host and port.
    pub fn connect_to(host: impl Into<String>, port: u16) -> ClientResult<Self> {
        Self::with_config(ClientConfig::builder().host(host).port(port).build()?)
    }

    /// Creates a TCP client for `config`.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        let transport = TcpTransport::from_config(&config);
        Self::with_transport(transport, config)
    }
}

impl<T: Transport> NubClient<T> {
    /// Creates a client over any transport.
    ///
    /// Connects immediately unless `config.lazy_connect` is set, failing fast
    /// when the server is unreachable.
    pub fn with_transport(transport: T, config: ClientConfig) -> ClientResult<Self> {
        let mut reconnector = Reconnector::new(transport, RetryPolicy::from_config(&config));
        if !config.lazy_connect {
            reconnector.connect_once()?;
        }
        info!(addr = %config.addr(), lazy = config.lazy_connect, "client ready");
        Ok(NubClient {
            config,
            executor: Mutex::new(CommandExecutor::new(reconnector)),
        })
    }

    /// The settings this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether the underlying transport currently holds a connection.
    pub fn is_connected(&self) -> bool {
        self.lock().is_connected()
    }

    /// Sets a value without expiration. Returns true when acknowledged.
    ///
    /// Strings, integers and floats are sent in their `Display` form.
    pub fn set(&self, key: &str, value: impl Display) -> ClientResult<bool> {
        let line = codec::set_command(key, &value.to_string(), None)?;
        Ok(codec::parse_ok(&self.execute(&line)?))
    }

    /// Sets a value that expires after `ttl`.
    ///
    /// The server counts whole seconds: `ttl` is truncated, except that a
    /// non-zero `ttl` under one second is sent as one second. A zero `ttl`
    /// stores the key without expiry.
    pub fn set_with_ttl(&self, key: &str, value: impl Display, ttl: Duration) -> ClientResult<bool> {
        let line = codec::set_command(key, &value.to_string(), Some(codec::ttl_secs(ttl)))?;
        Ok(codec::parse_ok(&self.execute(&line)?))
    }

    /// Fetches a value by key.
    ///
    /// Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let line = codec::key_command(Verb::Get, key)?;
        Ok(codec::parse_value(&self.execute(&line)?))
    }

    /// Deletes a key. Returns true when acknowledged.
    pub fn delete(&self, key: &str) -> ClientResult<bool> {
        let line = codec::key_command(Verb::Delete, key)?;
        Ok(codec::parse_ok(&self.execute(&line)?))
    }

    /// Checks whether a key exists.
    pub fn exists(&self, key: &str) -> ClientResult<bool> {
        let line = codec::key_command(Verb::Exists, key)?;
        Ok(codec::parse_exists(&self.execute(&line)?))
    }

    /// Increments an integer value and returns the new value.
    pub fn incr(&self, key: &str) -> ClientResult<i64> {
        let line = codec::key_command(Verb::Incr, key)?;
        codec::parse_integer(Verb::Incr, &self.execute(&line)?)
    }

    /// Decrements an integer value and returns the new value.
    pub fn decr(&self, key: &str) -> ClientResult<i64> {
        let line = codec::key_command(Verb::Decr, key)?;
        codec::parse_integer(Verb::Decr, &self.execute(&line)?)
    }

    /// Number of keys stored on the server.
    pub fn size(&self) -> ClientResult<u64> {
        codec::parse_size(&self.execute(Verb::Size.as_str())?)
    }

    /// Removes every key. Returns true when acknowledged.
    pub fn clear(&self) -> ClientResult<bool> {
        Ok(codec::parse_ok(&self.execute(Verb::Clear.as_str())?))
    }

    /// Round-trips a `SIZE` and reports whether it succeeded.
    pub fn ping(&self) -> bool {
        match self.size() {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "ping failed");
                false
            }
        }
    }

    /// Sets each pair in order. True only if every set was acknowledged.
    ///
    /// Earlier writes are not rolled back when a later one is refused.
    pub fn mset<K, V, I>(&self, pairs: I) -> ClientResult<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Display,
    {
        let mut all_ok = true;
        for (key, value) in pairs {
            all_ok &= self.set(key.as_ref(), value)?;
        }
        Ok(all_ok)
    }

    /// Fetches each key with its own `GET`. Missing keys map to `None`.
    pub fn mget<K: AsRef<str>>(&self, keys: &[K]) -> ClientResult<HashMap<String, Option<String>>> {
        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            let key = key.as_ref();
            values.insert(key.to_string(), self.get(key)?);
        }
        Ok(values)
    }

    /// Starts a batch whose commands are sent in one write.
    pub fn batch(&self) -> Batch<'_, T> {
        Batch::new(self)
    }

    /// Sends a best-effort `QUIT` and releases the connection.
    ///
    /// Safe to call repeatedly. With auto-reconnect enabled, a later command
    /// opens a fresh connection.
    pub fn close(&self) {
        self.lock().shutdown(Verb::Quit.as_str());
    }

    pub(crate) fn execute(&self, line: &str) -> ClientResult<String> {
        self.lock().execute(line)
    }

    pub(crate) fn execute_batch(&self, lines: &[String]) -> ClientResult<Vec<String>> {
        self.lock().execute_batch(lines)
    }

    fn lock(&self) -> MutexGuard<'_, CommandExecutor<T>> {
        // A panic mid-command leaves at worst a desynchronized stream, which
        // the next transport failure resets.
        self.executor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> Drop for NubClient<T> {
    fn drop(&mut self) {
        let executor = self
            .executor
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        executor.shutdown(Verb::Quit.as_str());
    }
}

impl<T: Transport> fmt::Debug for NubClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.executor.try_lock() {
            Ok(executor) if executor.is_connected() => "connected",
            Ok(_) => "disconnected",
            Err(_) => "busy",
        };
        f.debug_struct("NubClient")
            .field("addr", &self.config.addr())
            .field("state", &state)
            .finish()
    }
}
