//! Agent status register.

use std::sync::{Mutex, MutexGuard, PoisonError};

use riff_protocol::{AgentStatus, StatusEvent};

use crate::subscribers::{Subscribers, Subscription};

/// A status transition observed by the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: AgentStatus,
    pub current: AgentStatus,
}

#[derive(Debug, Default)]
struct RegisterState {
    status: AgentStatus,
    generation: u64,
}

/// Single slot holding the session's agent status, starting at `Idle`.
///
/// Written by delivered status events and by the consumer starting a request.
/// The generation counter only moves forward, on external resets.
#[derive(Default)]
pub struct StatusRegister {
    state: Mutex<RegisterState>,
    changes: Subscribers<StatusChange>,
}

impl StatusRegister {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegisterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> AgentStatus {
        self.lock().status
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Store `status`, notifying subscribers if it differs from the current one.
    pub fn set(&self, status: AgentStatus) -> bool {
        let change = {
            let mut state = self.lock();
            if state.status == status {
                return false;
            }
            let previous = std::mem::replace(&mut state.status, status);
            StatusChange {
                previous,
                current: status,
            }
        };

        self.changes.emit(&change);
        true
    }

    pub fn apply_event(&self, event: &StatusEvent) -> bool {
        self.set(AgentStatus::from(event.status))
    }

    /// Start a new generation, invalidating timers scheduled under the old one.
    pub fn bump_generation(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.generation
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusChange) + Send + Sync + 'static,
    {
        self.changes.subscribe(callback)
    }
}
