//! # Batched Commands
//!
//! Purpose: Queue commands and send them in one contiguous write, then read
//! one reply per command in submission order.
//!
//! Batches skip the executor's retry: once any line was written, replaying
//! the batch could apply commands twice.

use std::fmt::Display;
use std::time::Duration;

use crate::client::NubClient;
use crate::codec::{self, Reply, Verb};
use crate::error::ClientResult;
use crate::transport::Transport;

/// Builder collecting commands for [`NubClient::batch`].
///
/// Encoding errors are reported by [`Batch::execute`] before any I/O.
#[must_use = "a batch does nothing until executed"]
pub struct Batch<'a, T: Transport> {
    client: &'a NubClient<T>,
    commands: Vec<(Verb, ClientResult<String>)>,
}

impl<'a, T: Transport> Batch<'a, T> {
    pub(crate) fn new(client: &'a NubClient<T>) -> Self {
        Batch {
            client,
            commands: Vec::new(),
        }
    }

    pub fn set(mut self, key: &str, value: impl Display) -> Self {
        let line = codec::set_command(key, &value.to_string(), None);
        self.commands.push((Verb::Set, line));
        self
    }

    pub fn set_with_ttl(mut self, key: &str, value: impl Display, ttl: Duration) -> Self {
        let line = codec::set_command(key, &value.to_string(), Some(codec::ttl_secs(ttl)));
        self.commands.push((Verb::Set, line));
        self
    }

    pub fn get(self, key: &str) -> Self {
        self.keyed(Verb::Get, key)
    }

    pub fn delete(self, key: &str) -> Self {
        self.keyed(Verb::Delete, key)
    }

    pub fn exists(self, key: &str) -> Self {
        self.keyed(Verb::Exists, key)
    }

    pub fn incr(self, key: &str) -> Self {
        self.keyed(Verb::Incr, key)
    }

    pub fn decr(self, key: &str) -> Self {
        self.keyed(Verb::Decr, key)
    }

    pub fn size(mut self) -> Self {
        self.commands.push((Verb::Size, Ok(Verb::Size.as_str().to_string())));
        self
    }

    pub fn clear(mut self) -> Self {
        self.commands.push((Verb::Clear, Ok(Verb::Clear.as_str().to_string())));
        self
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Sends the batch and decodes one reply per queued command.
    ///
    /// The outer error covers encoding and transport failures, in which case
    /// nothing is decoded. Inner errors are per-command parse failures, such
    /// as an `INCR` on a non-numeric value.
    pub fn execute(self) -> ClientResult<Vec<ClientResult<Reply>>> {
        let mut verbs = Vec::with_capacity(self.commands.len());
        let mut lines = Vec::with_capacity(self.commands.len());
        for (verb, line) in self.commands {
            verbs.push(verb);
            lines.push(line?);
        }

        let responses = self.client.execute_batch(&lines)?;
        Ok(verbs
            .into_iter()
            .zip(responses.iter())
            .map(|(verb, response)| codec::decode(verb, response))
            .collect())
    }

    fn keyed(mut self, verb: Verb, key: &str) -> Self {
        self.commands.push((verb, codec::key_command(verb, key)));
        self
    }
}
