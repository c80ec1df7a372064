//! Plugin lifecycle state machine

use super::info::PluginInfo;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a registered plugin.
///
/// ```text
/// registered ──► initializing ──► ready
///      ▲              │  ▲          │
///      │              ▼  │          │
///      │            error           │
///      └────────────────────────────┘  (teardown)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Registered,
    Initializing,
    Ready,
    /// `init` failed; retried by initializing again
    Error,
}

impl LifecycleState {
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Registered, Initializing) | (Initializing, Ready) | (Initializing, Error) | (Error, Initializing) | (Ready, Registered)
        )
    }

    /// Next state, or [`Error::InvalidTransition`] for an illegal move
    pub fn transition(self, id: &str, next: LifecycleState) -> Result<LifecycleState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidTransition {
                id: id.to_string(),
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Registered => write!(f, "registered"),
            LifecycleState::Initializing => write!(f, "initializing"),
            LifecycleState::Ready => write!(f, "ready"),
            LifecycleState::Error => write!(f, "error"),
        }
    }
}

/// Registry bookkeeping for one plugin
#[derive(Debug, Clone, Serialize)]
pub struct PluginDescriptor {
    pub info: PluginInfo,
    pub state: LifecycleState,
    pub config: Option<serde_json::Value>,
    /// Message of the most recent init failure
    pub last_error: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub initialized_at: Option<DateTime<Utc>>,
}

impl PluginDescriptor {
    pub(crate) fn new(info: PluginInfo, config: Option<serde_json::Value>) -> Self {
        Self {
            info,
            state: LifecycleState::Registered,
            config,
            last_error: None,
            registered_at: Utc::now(),
            initialized_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub(crate) fn advance(&mut self, next: LifecycleState) -> Result<()> {
        self.state = self.state.transition(&self.info.id, next)?;
        match next {
            LifecycleState::Ready => {
                self.last_error = None;
                self.initialized_at = Some(Utc::now());
            }
            LifecycleState::Registered => self.initialized_at = None,
            _ => {}
        }
        Ok(())
    }
}

/// Plugin counts per lifecycle state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub registered: usize,
    pub initializing: usize,
    pub ready: usize,
    pub failed: usize,
}
