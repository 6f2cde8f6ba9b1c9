//! Service lifecycle state machine.
//!
//! ```text
//! uninitialized ──initialize──► initialized ──activate──► active
//!       ▲                            │                     │  ▲
//!       └──────────destroy───────────┤             deactivate  activate
//!       ▲                            │                     ▼  │
//!       └─────────destroy─────── error ◄──fail── (any)  inactive
//! ```
//!
//! `destroy` is legal from every state except `uninitialized`; `fail` is
//! legal from every state.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{GraphError, Result};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Initialized,
    Active,
    Inactive,
    Error,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Current lifecycle state plus the reason for the last failure.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    state: LifecycleState,
    last_error: Option<String>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    /// Reason passed to the last [`Lifecycle::fail`], cleared by `destroy`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn transition(
        &mut self,
        action: &str,
        allowed: &[LifecycleState],
        to: LifecycleState,
    ) -> Result<()> {
        if !allowed.contains(&self.state) {
            return Err(GraphError::InvalidState(format!(
                "cannot {} from state {}",
                action, self.state
            )));
        }
        debug!(from = %self.state, to = %to, "Lifecycle transition");
        self.state = to;
        Ok(())
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.transition(
            "initialize",
            &[LifecycleState::Uninitialized],
            LifecycleState::Initialized,
        )
    }

    pub fn activate(&mut self) -> Result<()> {
        self.transition(
            "activate",
            &[LifecycleState::Initialized, LifecycleState::Inactive],
            LifecycleState::Active,
        )
    }

    pub fn deactivate(&mut self) -> Result<()> {
        self.transition("deactivate", &[LifecycleState::Active], LifecycleState::Inactive)
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.transition(
            "destroy",
            &[
                LifecycleState::Initialized,
                LifecycleState::Active,
                LifecycleState::Inactive,
                LifecycleState::Error,
            ],
            LifecycleState::Uninitialized,
        )?;
        self.last_error = None;
        Ok(())
    }

    /// Move to `error` from any state.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(from = %self.state, reason = %reason, "Lifecycle failed");
        self.state = LifecycleState::Error;
        self.last_error = Some(reason);
    }

    /// Fail with `InvalidState` unless active.
    pub fn ensure_active(&self, operation: &str) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(GraphError::InvalidState(format!(
                "{} requires an active service (state: {})",
                operation, self.state
            )))
        }
    }
}
