//! User-facing session phase, tracked with rust-fsm.
//!
//! ```text
//!              SessionEstablished
//!  SignedOut ─────────────────────► SignedIn ◄──────────────┐
//!      ▲                              │   ▲                 │
//!      │ SessionCleared               │   │ SessionEstablished
//!      │ (from any state)  RefreshStarted │                 │
//!      │                              ▼   │                 │
//!      │                           Refreshing ──RefreshFailed──► Expired
//!      │                                                    │
//!      └────────────────────────────────────────────────────┘
//! ```
//!
//! The machine only mirrors what the session store has already done. It never
//! gates an operation; an inapplicable input is logged and dropped.

use crate::session_store::SessionEvent;
use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::debug;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_lifecycle(SignedOut)

    SignedOut => {
        SessionEstablished => SignedIn,
        SessionCleared => SignedOut
    },
    SignedIn => {
        SessionEstablished => SignedIn,
        RefreshStarted => Refreshing,
        SessionCleared => SignedOut
    },
    Refreshing => {
        SessionEstablished => SignedIn,
        RefreshFailed => Expired,
        SessionCleared => SignedOut
    },
    Expired => {
        SessionEstablished => SignedIn,
        RefreshStarted => Refreshing,
        SessionCleared => SignedOut
    }
}

pub use session_lifecycle::Input as LifecycleInput;
pub use session_lifecycle::State as LifecycleState;
pub use session_lifecycle::StateMachine as LifecycleMachine;

/// Session phase for display and status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    SignedOut,
    SignedIn,
    /// A renewal call is in flight.
    Refreshing,
    /// The last renewal failed and the session has not been torn down yet.
    Expired,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::SignedOut => "signed_out",
            SessionPhase::SignedIn => "signed_in",
            SessionPhase::Refreshing => "refreshing",
            SessionPhase::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&LifecycleState> for SessionPhase {
    fn from(state: &LifecycleState) -> Self {
        match state {
            LifecycleState::SignedOut => SessionPhase::SignedOut,
            LifecycleState::SignedIn => SessionPhase::SignedIn,
            LifecycleState::Refreshing => SessionPhase::Refreshing,
            LifecycleState::Expired => SessionPhase::Expired,
        }
    }
}

/// Feeds session events into the phase machine.
pub(crate) struct LifecycleTracker {
    machine: Mutex<LifecycleMachine>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self {
            machine: Mutex::new(LifecycleMachine::new()),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        let machine = self.machine.lock().unwrap_or_else(|p| p.into_inner());
        SessionPhase::from(machine.state())
    }

    pub fn observe(&self, event: &SessionEvent) {
        let input = match event {
            SessionEvent::Established { .. } => LifecycleInput::SessionEstablished,
            SessionEvent::RefreshStarted { .. } => LifecycleInput::RefreshStarted,
            SessionEvent::RefreshFailed { .. } => LifecycleInput::RefreshFailed,
            SessionEvent::Cleared { .. } => LifecycleInput::SessionCleared,
            SessionEvent::Ended { .. } => return,
        };

        let mut machine = self.machine.lock().unwrap_or_else(|p| p.into_inner());
        let from = machine.state().clone();
        if machine.consume(&input).is_err() {
            debug!(?from, ?input, "Ignoring inapplicable lifecycle transition");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_signed_out() {
        let machine = LifecycleMachine::new();
        assert_eq!(*machine.state(), LifecycleState::SignedOut);
    }

    #[test]
    fn test_refresh_success_returns_to_signed_in() {
        let mut machine = LifecycleMachine::new();

        machine.consume(&LifecycleInput::SessionEstablished).unwrap();
        machine.consume(&LifecycleInput::RefreshStarted).unwrap();
        assert_eq!(*machine.state(), LifecycleState::Refreshing);

        machine.consume(&LifecycleInput::SessionEstablished).unwrap();
        assert_eq!(*machine.state(), LifecycleState::SignedIn);
    }

    #[test]
    fn test_refresh_failure_then_teardown() {
        let mut machine = LifecycleMachine::new();

        machine.consume(&LifecycleInput::SessionEstablished).unwrap();
        machine.consume(&LifecycleInput::RefreshStarted).unwrap();
        machine.consume(&LifecycleInput::RefreshFailed).unwrap();
        assert_eq!(*machine.state(), LifecycleState::Expired);

        machine.consume(&LifecycleInput::SessionCleared).unwrap();
        assert_eq!(*machine.state(), LifecycleState::SignedOut);
    }

    #[test]
    fn test_cannot_refresh_while_signed_out() {
        let mut machine = LifecycleMachine::new();

        assert!(machine.consume(&LifecycleInput::RefreshStarted).is_err());
        assert!(machine.consume(&LifecycleInput::RefreshFailed).is_err());
        assert_eq!(*machine.state(), LifecycleState::SignedOut);
    }

    #[test]
    fn test_refresh_failed_requires_refresh_in_flight() {
        let mut machine = LifecycleMachine::new();
        machine.consume(&LifecycleInput::SessionEstablished).unwrap();

        assert!(machine.consume(&LifecycleInput::RefreshFailed).is_err());
        assert_eq!(*machine.state(), LifecycleState::SignedIn);
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&SessionPhase::SignedIn).unwrap();
        assert_eq!(json, "\"signed_in\"");
        assert_eq!(SessionPhase::Refreshing.to_string(), "refreshing");
    }

    #[test]
    fn test_tracker_ignores_inapplicable_events() {
        let tracker = LifecycleTracker::new();
        tracker.observe(&SessionEvent::RefreshFailed {
            epoch: 0,
            reason: "late".to_string(),
        });
        assert_eq!(tracker.phase(), SessionPhase::SignedOut);
    }
}
