use parking_lot::Mutex;
use serde::Serialize;

use crate::common::errors::SessionError;

/// Lifecycle of one stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Starting,
    Streaming,
    Paused,
    Finished,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Failed)
    }
}

/// The single completion value a session reports.
#[derive(Debug)]
pub enum SessionOutcome {
    /// End of stream, or the voice sink stopped accepting frames.
    Finished,
    /// Stopped by skip or stop.
    Cancelled,
    Failed(SessionError),
}

impl SessionOutcome {
    pub fn state(&self) -> SessionState {
        match self {
            Self::Finished => SessionState::Finished,
            Self::Cancelled => SessionState::Cancelled,
            Self::Failed(_) => SessionState::Failed,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    paused: bool,
    frames_sent: u64,
}

/// State shared between a session handle and its tasks.
#[derive(Debug)]
pub struct SessionShared {
    inner: Mutex<Inner>,
}

impl SessionShared {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::Starting,
                paused: false,
                frames_sent: 0,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    pub fn frames_sent(&self) -> u64 {
        self.inner.lock().frames_sent
    }

    pub fn record_frame(&self) {
        self.inner.lock().frames_sent += 1;
    }

    /// Enters `Streaming`, or `Paused` if a pause arrived during startup.
    pub fn begin_streaming(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Starting {
            inner.state = if inner.paused {
                SessionState::Paused
            } else {
                SessionState::Streaming
            };
        }
    }

    /// Sets the paused flag. Returns `false` if it already had that value.
    pub fn set_paused(&self, paused: bool) -> bool {
        let mut inner = self.inner.lock();
        if inner.paused == paused {
            return false;
        }
        inner.paused = paused;
        inner.state = match (inner.state, paused) {
            (SessionState::Streaming, true) => SessionState::Paused,
            (SessionState::Paused, false) => SessionState::Streaming,
            (state, _) => state,
        };
        true
    }

    /// Records the terminal state. Later calls are ignored.
    pub fn finish(&self, state: SessionState) {
        let mut inner = self.inner.lock();
        if !inner.state.is_terminal() {
            inner.state = state;
        }
    }
}

impl Default for SessionShared {
    fn default() -> Self {
        Self::new()
    }
}
