//! Listener lifecycle state machine with thread-safe transitions.
//!
//! Valid transitions:
//! - Stopped -> Starting (start requested)
//! - Starting -> Running (socket bound, loop spawned)
//! - Starting -> Stopped (bind failed)
//! - Running -> Stopping (stop requested, or transport closed)
//! - Stopping -> Stopped (loop exited or shutdown timed out)

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use haptic_core::HapticError;

/// Operational state of the OSC listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::Stopped => write!(f, "Stopped"),
            ListenerState::Starting => write!(f, "Starting"),
            ListenerState::Running => write!(f, "Running"),
            ListenerState::Stopping => write!(f, "Stopping"),
        }
    }
}

impl ListenerState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &ListenerState) -> bool {
        matches!(
            (self, target),
            (ListenerState::Stopped, ListenerState::Starting)
                | (ListenerState::Starting, ListenerState::Running)
                | (ListenerState::Starting, ListenerState::Stopped)
                | (ListenerState::Running, ListenerState::Stopping)
                | (ListenerState::Stopping, ListenerState::Stopped)
        )
    }
}

/// Shared lifecycle state. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<ListenerState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Stopped`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ListenerState::Stopped)),
        }
    }

    pub fn current(&self) -> ListenerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attempt to transition to `target`, validating against the current state.
    pub fn transition(&self, target: ListenerState) -> Result<(), HapticError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_transition_to(&target) {
            tracing::debug!("OSC listener state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(HapticError::InvalidTransition {
                from: state.to_string(),
                to: target.to_string(),
            })
        }
    }

    /// Move from `from` to `to` only if the machine is currently in `from`.
    ///
    /// Returns whether the transition happened. Used where the listener task
    /// and `stop` may race to end a run.
    pub fn transition_if(&self, from: ListenerState, to: ListenerState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == from && from.can_transition_to(&to) {
            tracing::debug!("OSC listener state: {} -> {}", *state, to);
            *state = to;
            true
        } else {
            false
        }
    }

    /// Force the state machine to `Stopped` (end of a stop, whatever the path).
    pub fn force_stopped(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != ListenerState::Stopped {
            tracing::debug!("OSC listener state: {} -> Stopped (forced)", *state);
        }
        *state = ListenerState::Stopped;
    }
}
