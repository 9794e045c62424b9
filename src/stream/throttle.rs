//! Accept-or-drop gate bounding the outbound update rate.
//!
//! The gate alternates between admitting and suppressing, so only every other
//! submitted batch reaches the wire. It never looks at the clock: a caller
//! submitting at 10 Hz still transmits at 5 Hz. Nothing is queued or delayed.

/// Decision the throttle will make for the next submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThrottleGate {
    /// The next batch is transmitted.
    #[default]
    Admit,
    /// The next batch is dropped.
    Suppress,
}

/// Two-state decimating throttle.
#[derive(Debug, Default)]
pub struct UpdateThrottle {
    gate: ThrottleGate,
}

impl UpdateThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the current batch should be transmitted, flipping the gate
    /// either way.
    pub fn admit(&mut self) -> bool {
        match self.gate {
            ThrottleGate::Admit => {
                self.gate = ThrottleGate::Suppress;
                true
            }
            ThrottleGate::Suppress => {
                self.gate = ThrottleGate::Admit;
                false
            }
        }
    }

    pub fn gate(&self) -> ThrottleGate {
        self.gate
    }
}
