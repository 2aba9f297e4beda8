//! # NubDB Sync Client
//!
//! Purpose: Provide a blocking client for the NubDB line protocol that
//! survives dropped connections without leaking them to the caller.
//!
//! ## Design Principles
//! 1. **Layered Execution**: Transport → Reconnector → CommandExecutor →
//!    codec → `NubClient`, each owning one concern.
//! 2. **Single Outstanding Request**: One command on the wire at a time.
//! 3. **Typed Failures**: Transport, timeout and grammar errors stay distinct.
//! 4. **Protocol Clarity**: Request quoting and response parsing live in one
//!    module.
//!
//! ```no_run
//! use nubdb_client::NubClient;
//!
//! # fn main() -> nubdb_client::ClientResult<()> {
//! let db = NubClient::connect()?;
//! db.set("counter", 100)?;
//! assert_eq!(db.incr("counter")?, 101);
//! db.close();
//! # Ok(())
//! # }
//! ```

mod batch;
mod client;
mod codec;
mod config;
mod error;
mod executor;
mod reconnect;
mod transport;

pub use batch::Batch;
pub use client::NubClient;
pub use codec::{Reply, Verb};
pub use config::{
    ClientConfig, ClientConfigBuilder, DEFAULT_HOST, DEFAULT_MAX_RETRIES, DEFAULT_PORT,
    DEFAULT_TIMEOUT, HOST_ENV, PORT_ENV,
};
pub use error::{ClientError, ClientResult};
pub use executor::CommandExecutor;
pub use reconnect::{Reconnector, RetryPolicy};
pub use transport::{ProcessTransport, TcpTransport, Transport};
