use std::time::Instant;

use thiserror::Error;

/// Lifecycle of one secure session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Handshaking,
    Connected { since: Instant },
    Closing,
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid session transition {from} -> {to}")]
pub struct SessionStateError {
    pub from: &'static str,
    pub to: &'static str,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Handshaking => "handshaking",
            SessionState::Connected { .. } => "connected",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected { .. })
    }

    /// Validates and applies a transition.
    pub fn transition(&self, next: SessionState) -> Result<SessionState, SessionStateError> {
        use SessionState::*;
        let allowed = matches!(
            (self, &next),
            (Disconnected, Handshaking)
                | (Handshaking, Connected { .. })
                | (Handshaking, Closing)
                | (Connected { .. }, Closing)
                | (Closing, Closed)
        );
        if allowed {
            Ok(next)
        } else {
            Err(SessionStateError {
                from: self.name(),
                to: next.name(),
            })
        }
    }
}
