// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle state of an extension server and its shutdown handshake.

use std::sync::{Mutex, MutexGuard};

use strum::Display;
use tokio::sync::watch;
use tracing::{debug, info};

/// Where a server is in its life.
///
/// `Constructed → Registering → Listening → Serving → ShuttingDown → Stopped`,
/// with `Failed` reachable from any non-terminal state. `Stopped` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    Constructed,
    Registering,
    Listening,
    Serving,
    ShuttingDown,
    Stopped,
    Failed,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }
}

#[derive(Default)]
struct Inner {
    listener: Option<quarry_transport::ServerHandle>,
    started: bool,
    stop_requested: bool,
}

/// Shared between the server, its request handler and any [`ServerHandle`](crate::ServerHandle).
pub(crate) struct Lifecycle {
    state: watch::Sender<LifecycleState>,
    inner: Mutex<Inner>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Constructed);
        Self {
            state,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Moves to `next` unless the current state is terminal. Returns whether
    /// the state changed.
    pub(crate) fn transition(&self, next: LifecycleState) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            debug!(from = %current, to = %next, "lifecycle transition");
            *current = next;
            true
        })
    }

    // The guarded fields are plain flags and an optional handle, all valid
    // after a panic elsewhere.
    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn is_started(&self) -> bool {
        self.inner().started
    }

    /// Records the listener of a server about to serve and marks it started.
    /// A shutdown requested earlier stops it right away.
    pub(crate) fn attach(&self, listener: quarry_transport::ServerHandle) {
        let mut inner = self.inner();
        if inner.stop_requested {
            drop(inner);
            self.transition(LifecycleState::ShuttingDown);
            tokio::spawn(listener.stop());
            return;
        }
        inner.started = true;
        inner.listener = Some(listener);
        drop(inner);
        self.transition(LifecycleState::Serving);
    }

    /// Stops the listener, if any, without waiting for it.
    ///
    /// The handle is taken under the lock and stopped from a separate task,
    /// so a shutdown issued from inside a request handler never waits on the
    /// server that is running it. Calling this again is a no-op. Must be
    /// called from within a tokio runtime.
    pub(crate) fn shutdown(&self) {
        let mut inner = self.inner();
        inner.stop_requested = true;
        let Some(listener) = inner.listener.take() else {
            return;
        };
        drop(inner);
        info!("shutting down extension server");
        self.transition(LifecycleState::ShuttingDown);
        tokio::spawn(listener.stop());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_absorb_transitions() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.transition(LifecycleState::Registering));
        assert!(lifecycle.transition(LifecycleState::Failed));
        assert!(!lifecycle.transition(LifecycleState::Serving));
        assert!(!lifecycle.transition(LifecycleState::Stopped));
        assert_eq!(lifecycle.state(), LifecycleState::Failed);
    }

    #[test]
    fn repeated_transition_is_not_a_change() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.transition(LifecycleState::Constructed));
    }

    #[test]
    fn shutdown_before_serving_is_recorded_only() {
        let lifecycle = Lifecycle::new();
        lifecycle.shutdown();
        lifecycle.shutdown();
        assert_eq!(lifecycle.state(), LifecycleState::Constructed);
        assert!(!lifecycle.is_started());
    }

    #[test]
    fn state_names_are_snake_case() {
        assert_eq!(LifecycleState::ShuttingDown.to_string(), "shutting_down");
        assert!(LifecycleState::Stopped.is_terminal());
        assert!(!LifecycleState::Serving.is_terminal());
    }
}
