//! Scripted in-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{ClientError, ClientResult};
use crate::transport::Transport;

/// Scripted outcome of one `read_line`.
pub(crate) enum Reply {
    Line(&'static str),
    Closed,
    Timeout,
}

#[derive(Default)]
pub(crate) struct MockState {
    pub connected: bool,
    pub connect_calls: usize,
    pub close_calls: usize,
    /// Outcomes of upcoming connect attempts; `true` succeeds. Empty means succeed.
    pub connect_results: VecDeque<bool>,
    pub replies: VecDeque<Reply>,
    pub written: Vec<String>,
}

/// Transport whose behavior is scripted through a shared [`MockState`].
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    pub state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn connected() -> Self {
        let mock = MockTransport::default();
        mock.state.lock().unwrap().connected = true;
        mock
    }

    pub fn push_replies(&self, replies: impl IntoIterator<Item = Reply>) {
        self.state.lock().unwrap().replies.extend(replies);
    }

    pub fn push_connects(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.state.lock().unwrap().connect_results.extend(outcomes);
    }

    pub fn snapshot<R>(&self, f: impl FnOnce(&MockState) -> R) -> R {
        f(&self.state.lock().unwrap())
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> ClientResult<()> {
        let mut state = self.state.lock().unwrap();
        state.connect_calls += 1;
        if state.connect_results.pop_front().unwrap_or(true) {
            state.connected = true;
            Ok(())
        } else {
            Err(ClientError::connection("refused"))
        }
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.close_calls += 1;
        state.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    fn write_all(&mut self, payload: &[u8]) -> ClientResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(ClientError::ConnectionClosed);
        }
        let text = String::from_utf8_lossy(payload);
        state
            .written
            .extend(text.split_terminator('\n').map(str::to_string));
        Ok(())
    }

    fn read_line(&mut self) -> ClientResult<String> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(ClientError::ConnectionClosed);
        }
        match state.replies.pop_front() {
            Some(Reply::Line(line)) => Ok(line.to_string()),
            Some(Reply::Timeout) => Err(ClientError::Timeout("scripted".into())),
            Some(Reply::Closed) | None => {
                state.connected = false;
                Err(ClientError::ConnectionClosed)
            }
        }
    }

    fn peer(&self) -> String {
        "mock".to_string()
    }
}
