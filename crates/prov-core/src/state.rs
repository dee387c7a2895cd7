//! Per-component install state machine.
//!
//! ```text
//! PENDING ──> SKIPPED
//!    │
//!    └──> INSTALLING ──> VERIFYING ──> SUCCESS
//!              │              │
//!              └──────────────┴──> FAILED_ROLLED_BACK
//! ```

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentState {
    Pending,
    Skipped,
    Installing,
    Verifying,
    Success,
    FailedRolledBack,
}

impl ComponentState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ComponentState::Success | ComponentState::FailedRolledBack | ComponentState::Skipped
        )
    }

    pub fn can_transition_to(self, next: ComponentState) -> bool {
        use ComponentState::*;
        matches!(
            (self, next),
            (Pending, Skipped)
                | (Pending, Installing)
                | (Installing, Verifying)
                | (Installing, FailedRolledBack)
                | (Verifying, Success)
                | (Verifying, FailedRolledBack)
        )
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComponentState::Pending => "PENDING",
            ComponentState::Skipped => "SKIPPED",
            ComponentState::Installing => "INSTALLING",
            ComponentState::Verifying => "VERIFYING",
            ComponentState::Success => "SUCCESS",
            ComponentState::FailedRolledBack => "FAILED_ROLLED_BACK",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid component state transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ComponentState,
    pub to: ComponentState,
}

/// States a component has passed through, starting at `PENDING`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StateHistory {
    states: Vec<ComponentState>,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self {
            states: vec![ComponentState::Pending],
        }
    }
}

impl StateHistory {
    pub fn current(&self) -> ComponentState {
        self.states.last().copied().unwrap_or(ComponentState::Pending)
    }

    pub fn advance(&mut self, next: ComponentState) -> Result<(), InvalidTransition> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(InvalidTransition { from, to: next });
        }
        self.states.push(next);
        Ok(())
    }

    pub fn states(&self) -> &[ComponentState] {
        &self.states
    }
}
