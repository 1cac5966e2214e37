use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumIter};

use super::StateMachine;
use crate::{Error, Result};

/// Where a create or restore currently is.
///
/// ```text
/// create:  Idle -> Creating -> Done | Failed
/// restore: Idle -> BackingUp -> Restoring -> Done
///                                         -> RollingBack -> Done | Fatal
///          Idle | BackingUp -> Failed   (nothing live touched yet)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Creating,
    BackingUp,
    Restoring,
    RollingBack,
    Done,
    /// Aborted before live state was modified.
    Failed,
    /// Restore and rollback both failed; live state unknown.
    Fatal,
}

impl StateMachine for LifecycleState {
    fn can_transition_to(self, next: Self) -> bool {
        self.valid_next_states().contains(&next)
    }

    fn valid_next_states(self) -> Vec<Self> {
        match self {
            Self::Idle => vec![Self::Creating, Self::BackingUp, Self::Failed],
            Self::Creating => vec![Self::Done, Self::Failed],
            Self::BackingUp => vec![Self::Restoring, Self::Failed],
            Self::Restoring => vec![Self::Done, Self::RollingBack],
            Self::RollingBack => vec![Self::Done, Self::Fatal],
            Self::Done | Self::Failed | Self::Fatal => Vec::new(),
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Fatal)
    }

    fn all_states() -> &'static [Self] {
        &[
            Self::Idle,
            Self::Creating,
            Self::BackingUp,
            Self::Restoring,
            Self::RollingBack,
            Self::Done,
            Self::Failed,
            Self::Fatal,
        ]
    }
}

/// State transition event with timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

impl StateTransition {
    pub fn new(from: LifecycleState, to: LifecycleState, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            timestamp: Utc::now(),
            reason: reason.into(),
        }
    }

    /// Validate that the transition is allowed
    pub fn validate(&self) -> Result<()> {
        if self.from.can_transition_to(self.to) {
            Ok(())
        } else {
            Err(Error::configuration(format!(
                "Invalid state transition: {} -> {}",
                self.from, self.to
            )))
        }
    }
}

/// Current state plus the transitions that led to it.
#[derive(Debug, Clone)]
pub struct StateTracker {
    current: LifecycleState,
    history: Vec<StateTransition>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self {
            current: LifecycleState::Idle,
            history: Vec::new(),
        }
    }
}

impl StateTracker {
    pub fn current(&self) -> LifecycleState {
        self.current
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Start over at `Idle` for a new operation.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn advance(&mut self, to: LifecycleState, reason: impl Into<String>) -> Result<()> {
        let transition = StateTransition::new(self.current, to, reason);
        transition.validate()?;
        tracing::debug!(
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            "lifecycle transition"
        );
        self.current = to;
        self.history.push(transition);
        Ok(())
    }
}
