//! # Line Protocol Encoding and Parsing
//!
//! Purpose: Build single-line NubDB requests and normalize the free-form
//! response lines into typed values.
//!
//! ## Design Principles
//! 1. **Lenient Text, Strict Signals**: Responses may carry human-readable
//!    annotations, but the numeric/boolean token a command depends on must
//!    parse, or the call fails with `Command`.
//! 2. **One Quoting Rule**: Values are quoted only when they would otherwise
//!    break tokenization, escaping `\` and `"` inside the quotes.
//! 3. **Fail Fast**: Anything that cannot be expressed on one line is rejected
//!    before it reaches the socket.
//!
//! ## Wire Forms
//!
//! ```text
//! SET <key> <value> [ttl]   -> OK
//! GET <key>                 -> "value" | value | (nil)
//! DELETE <key>              -> OK
//! EXISTS <key>              -> 1 | 0
//! INCR <key> / DECR <key>   -> <integer>
//! SIZE                      -> <n> | <n> keys
//! CLEAR                     -> OK
//! ```

use std::borrow::Cow;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Protocol verbs understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Set,
    Get,
    Delete,
    Exists,
    Incr,
    Decr,
    Size,
    Clear,
    Quit,
}

impl Verb {
    pub const fn as_str(self) -> &'static str {
        match self {
            Verb::Set => "SET",
            Verb::Get => "GET",
            Verb::Delete => "DELETE",
            Verb::Exists => "EXISTS",
            Verb::Incr => "INCR",
            Verb::Decr => "DECR",
            Verb::Size => "SIZE",
            Verb::Clear => "CLEAR",
            Verb::Quit => "QUIT",
        }
    }
}

/// Typed result of one command, as produced by [`decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// SET, DELETE, CLEAR: whether the server acknowledged with `OK`.
    Ok(bool),
    /// GET: the value, or `None` when absent.
    Value(Option<String>),
    /// EXISTS.
    Exists(bool),
    /// INCR, DECR: the new counter value.
    Integer(i64),
    /// SIZE: number of stored keys.
    Size(u64),
}

/// Checks that `key` is a single non-empty token.
pub fn validate_key(key: &str) -> ClientResult<&str> {
    if key.is_empty() {
        return Err(ClientError::InvalidArgument("key must not be empty".into()));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ClientError::InvalidArgument(format!(
            "key {key:?} contains whitespace or control characters"
        )));
    }
    Ok(key)
}

/// Encodes a value as one protocol token.
pub fn encode_value(value: &str) -> ClientResult<Cow<'_, str>> {
    if value.contains(['\n', '\r']) {
        return Err(ClientError::InvalidArgument(
            "value must not contain line breaks".into(),
        ));
    }
    let needs_quotes = value.is_empty() || value.contains(|c: char| c.is_whitespace() || c == '"');
    if !needs_quotes {
        return Ok(Cow::Borrowed(value));
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    Ok(Cow::Owned(quoted))
}

/// `SET <key> <value> [ttl]`. A zero TTL is omitted.
pub fn set_command(key: &str, value: &str, ttl_secs: Option<u64>) -> ClientResult<String> {
    let key = validate_key(key)?;
    let value = encode_value(value)?;
    let mut line = format!("{} {} {}", Verb::Set.as_str(), key, value);
    if let Some(ttl) = ttl_secs.filter(|ttl| *ttl > 0) {
        line.push(' ');
        line.push_str(&ttl.to_string());
    }
    Ok(line)
}

/// Whole seconds sent for a TTL. Sub-second expiries round up to one second
/// so a requested expiry never turns into a permanent key.
pub fn ttl_secs(ttl: Duration) -> u64 {
    match ttl.as_secs() {
        0 if !ttl.is_zero() => 1,
        secs => secs,
    }
}

/// `<VERB> <key>` for the single-key verbs.
pub fn key_command(verb: Verb, key: &str) -> ClientResult<String> {
    let key = validate_key(key)?;
    Ok(format!("{} {}", verb.as_str(), key))
}

/// `SET`/`DELETE`/`CLEAR` acknowledgement.
pub fn parse_ok(line: &str) -> bool {
    line.contains("OK")
}

/// GET payload with one layer of surrounding quotes removed.
pub fn parse_value(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty()
        || trimmed.contains("(nil)")
        || trimmed.to_ascii_lowercase().contains("not found")
    {
        return None;
    }
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    Some(unquoted.to_string())
}

/// EXISTS flag.
pub fn parse_exists(line: &str) -> bool {
    line.trim() == "1"
}

/// INCR/DECR counter.
pub fn parse_integer(verb: Verb, line: &str) -> ClientResult<i64> {
    line.trim().parse::<i64>().map_err(|_| ClientError::Command {
        verb: verb.as_str(),
        response: line.to_string(),
    })
}

/// SIZE count; the first whitespace token must be the number.
pub fn parse_size(line: &str) -> ClientResult<u64> {
    line.split_whitespace()
        .next()
        .and_then(|token| token.parse::<u64>().ok())
        .ok_or_else(|| ClientError::Command {
            verb: Verb::Size.as_str(),
            response: line.to_string(),
        })
}

/// Decodes a response line according to the verb that produced it.
pub fn decode(verb: Verb, line: &str) -> ClientResult<Reply> {
    match verb {
        Verb::Set | Verb::Delete | Verb::Clear => Ok(Reply::Ok(parse_ok(line))),
        Verb::Get => Ok(Reply::Value(parse_value(line))),
        Verb::Exists => Ok(Reply::Exists(parse_exists(line))),
        Verb::Incr | Verb::Decr => parse_integer(verb, line).map(Reply::Integer),
        Verb::Size => parse_size(line).map(Reply::Size),
        Verb::Quit => Err(ClientError::Command {
            verb: verb.as_str(),
            response: line.to_string(),
        }),
    }
}
