//! # Process Transport
//!
//! Purpose: Drive a locally spawned NubDB binary over its stdin/stdout, for
//! setups without a listening server. Higher latency than TCP and kept for
//! compatibility only.
//!
//! ## Notes
//! - Pipes carry no deadlines in std, so reads block until the child answers
//!   or exits. The configured client timeout does not apply here.
//! - The interactive binary prints a banner and a prompt line before each
//!   answer; both are consumed here so the executor sees one line per command.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{classify_io, ClientError, ClientResult};
use crate::transport::{take_complete_line, Transport};

/// Startup lines scanned for the ready marker before giving up on it.
const DEFAULT_STARTUP_LINES: usize = 5;
/// How long `close` waits for the child to exit after `QUIT` before killing it.
const EXIT_GRACE: Duration = Duration::from_secs(2);
const QUIT_LINE: &[u8] = b"QUIT\n";
const EXIT_POLL: Duration = Duration::from_millis(10);

/// Transport backed by a child process speaking the line protocol on stdio.
#[derive(Debug)]
pub struct ProcessTransport {
    program: OsString,
    args: Vec<OsString>,
    ready_marker: Option<String>,
    startup_lines: usize,
    skip_prompt: bool,
    session: Option<Session>,
}

#[derive(Debug)]
struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl ProcessTransport {
    /// Creates a transport that will spawn `program` on connect.
    pub fn new(program: impl Into<OsString>) -> Self {
        ProcessTransport {
            program: program.into(),
            args: Vec::new(),
            ready_marker: None,
            startup_lines: DEFAULT_STARTUP_LINES,
            skip_prompt: false,
            session: None,
        }
    }

    /// Appends a command-line argument for the child.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Consume startup output up to and including a line containing `marker`.
    pub fn ready_marker(mut self, marker: impl Into<String>) -> Self {
        self.ready_marker = Some(marker.into());
        self
    }

    /// Maximum startup lines scanned for the ready marker.
    pub fn startup_lines(mut self, lines: usize) -> Self {
        self.startup_lines = lines;
        self
    }

    /// Discard one prompt line before every response.
    pub fn skip_prompt(mut self, skip: bool) -> Self {
        self.skip_prompt = skip;
        self
    }

    fn spawn(&self) -> ClientResult<Session> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                ClientError::connection_caused_by(format!("could not spawn {}", self.peer()), err)
            })?;

        match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => Ok(Session {
                child,
                stdin: Some(stdin),
                stdout: BufReader::new(stdout),
            }),
            _ => {
                reap(&mut child);
                Err(ClientError::connection(format!(
                    "{} started without piped stdio",
                    self.peer()
                )))
            }
        }
    }

    fn await_ready(&self, session: &mut Session) -> ClientResult<()> {
        let marker = match &self.ready_marker {
            Some(marker) => marker,
            None => return Ok(()),
        };
        for _ in 0..self.startup_lines {
            let line = read_raw_line(&mut session.stdout)?;
            if line.contains(marker.as_str()) {
                return Ok(());
            }
        }
        warn!(peer = %self.peer(), %marker, "ready marker not seen, continuing");
        Ok(())
    }

    fn session_mut(&mut self) -> ClientResult<&mut Session> {
        self.session.as_mut().ok_or(ClientError::ConnectionClosed)
    }
}

impl Transport for ProcessTransport {
    fn connect(&mut self) -> ClientResult<()> {
        self.close();
        let mut session = self.spawn()?;
        if let Err(err) = self.await_ready(&mut session) {
            reap(&mut session.child);
            return Err(ClientError::connection_caused_by(
                format!("{} exited during startup", self.peer()),
                err,
            ));
        }
        info!(peer = %self.peer(), pid = session.child.id(), "process started");
        self.session = Some(session);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            // QUIT, then EOF, lets the child flush its data and exit on its own.
            if let Some(mut stdin) = session.stdin.take() {
                if let Err(err) = stdin.write_all(QUIT_LINE).and_then(|()| stdin.flush()) {
                    debug!(peer = %self.peer(), error = %err, "quit not delivered");
                }
            }
            reap(&mut session.child);
            debug!(peer = %self.peer(), "process reaped");
        }
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn write_all(&mut self, payload: &[u8]) -> ClientResult<()> {
        let stdin = self
            .session_mut()?
            .stdin
            .as_mut()
            .ok_or(ClientError::ConnectionClosed)?;
        stdin
            .write_all(payload)
            .and_then(|()| stdin.flush())
            .map_err(|err| classify_io(err, "writing to process"))
    }

    fn read_line(&mut self) -> ClientResult<String> {
        let skip_prompt = self.skip_prompt;
        let session = self.session_mut()?;
        if skip_prompt {
            read_raw_line(&mut session.stdout)?;
        }
        read_raw_line(&mut session.stdout)
    }

    fn peer(&self) -> String {
        format!("process {}", self.program.to_string_lossy())
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_raw_line(reader: &mut BufReader<ChildStdout>) -> ClientResult<String> {
    let mut buf = String::new();
    match reader.read_line(&mut buf) {
        Ok(0) => Err(ClientError::ConnectionClosed),
        Ok(_) => take_complete_line(buf).ok_or(ClientError::ConnectionClosed),
        Err(err) => Err(classify_io(err, "reading from process")),
    }
}

fn reap(child: &mut Child) {
    let mut waited = Duration::ZERO;
    while waited < EXIT_GRACE {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => {
                thread::sleep(EXIT_POLL);
                waited += EXIT_POLL;
            }
            Err(_) => break,
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}
