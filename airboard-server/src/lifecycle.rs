//! Application lifecycle: foreground/background transitions.
//!
//! The host (terminal session, web client visibility, ...) reports its state
//! through a `LifecycleObserver`. Subscribers are woken on transitions only;
//! reporting the state already held is not an event.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Active,
    Inactive,
    Background,
}

impl LifecycleState {
    /// Only an active app is in the foreground.
    pub fn is_foreground(self) -> bool {
        self == LifecycleState::Active
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::Inactive => "inactive",
            LifecycleState::Background => "background",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "foreground" => Ok(LifecycleState::Active),
            "inactive" => Ok(LifecycleState::Inactive),
            "background" => Ok(LifecycleState::Background),
            other => Err(format!("unknown lifecycle state: {other}")),
        }
    }
}

/// Publishes lifecycle transitions to any number of subscribers.
#[derive(Clone)]
pub struct LifecycleObserver {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl LifecycleObserver {
    pub fn new(initial: LifecycleState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        LifecycleObserver { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Report a new state. Returns true if it was a transition.
    pub fn set(&self, next: LifecycleState) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            tracing::debug!(state = %next, "Lifecycle transition");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }
}
