//! Connection Session State Machine
//!
//! Defines valid lifecycle transitions for a single connect/send/disconnect
//! session. `Disconnected` is terminal; reconnecting needs a new session.

use std::fmt;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Caller asked to disconnect
    Requested,
    /// Transport could not connect
    ConnectFailed,
    /// A write failed
    WriteFailed,
    /// Transport reported the link went away
    LinkLost,
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connection attempt started
    ConnectStarted,
    /// Transport accepted the connection
    ConnectSucceeded,
    /// Transport rejected the connection
    ConnectFailed,
    /// A frame was written
    WriteSucceeded,
    /// A frame write failed
    WriteFailed,
    /// Caller requested disconnect
    DisconnectRequested,
    /// Transport pushed a disconnect
    LinkLost,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state is now the given one
    Success(SessionState),
    /// Session moved into `Disconnected` for the given reason
    Ended(DisconnectReason),
    /// A disconnect arrived after the session had already ended
    AlreadyDisconnected,
    /// Transition was invalid from current state
    Invalid {
        from: SessionState,
        event: SessionEvent,
    },
}

/// Tracks one session's lifecycle
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    current_state: SessionState,
    ended_by: Option<DisconnectReason>,
}

impl SessionStateMachine {
    /// Create a new state machine in Idle state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.current_state
    }

    /// Reason the session ended, once it has
    pub fn ended_by(&self) -> Option<DisconnectReason> {
        self.ended_by
    }

    pub fn is_connected(&self) -> bool {
        self.current_state == SessionState::Connected
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: SessionEvent) -> TransitionResult {
        use SessionEvent::*;
        use SessionState::*;

        let reason = match (self.current_state, event) {
            (Idle, ConnectStarted) => return self.move_to(Connecting),
            (Connecting, ConnectSucceeded) => return self.move_to(Connected),
            (Connected, WriteSucceeded) => return TransitionResult::Success(Connected),

            (Connecting, ConnectFailed) => DisconnectReason::ConnectFailed,
            (Connected, WriteFailed) => DisconnectReason::WriteFailed,
            (Connecting | Connected, DisconnectRequested) => DisconnectReason::Requested,
            (Connecting | Connected, LinkLost) => DisconnectReason::LinkLost,

            // Whichever path ends the session first wins
            (Disconnected, DisconnectRequested | LinkLost) => {
                return TransitionResult::AlreadyDisconnected
            }

            (from, event) => return TransitionResult::Invalid { from, event },
        };

        self.current_state = Disconnected;
        self.ended_by = Some(reason);
        TransitionResult::Ended(reason)
    }

    fn move_to(&mut self, state: SessionState) -> TransitionResult {
        self.current_state = state;
        TransitionResult::Success(state)
    }
}
