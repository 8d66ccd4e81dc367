//! Release run states and the transitions allowed between them.

use crate::error::{ReleaseError, Result};
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Stage of a release run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseState {
    Idle,
    Fetching,
    Classifying,
    Resolving,
    NoRelease,
    Preparing,
    Publishing,
    Committing,
    Done,
    Failed,
}

impl ReleaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseState::Idle => "IDLE",
            ReleaseState::Fetching => "FETCHING",
            ReleaseState::Classifying => "CLASSIFYING",
            ReleaseState::Resolving => "RESOLVING",
            ReleaseState::NoRelease => "NO_RELEASE",
            ReleaseState::Preparing => "PREPARING",
            ReleaseState::Publishing => "PUBLISHING",
            ReleaseState::Committing => "COMMITTING",
            ReleaseState::Done => "DONE",
            ReleaseState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReleaseState::NoRelease | ReleaseState::Done | ReleaseState::Failed
        )
    }

    /// Transition table. `Failed` is reachable from every non-terminal state;
    /// `NoRelease` is also reachable from `Preparing` and `Publishing` when the
    /// computed version turns out to be released already.
    pub fn can_transition_to(&self, next: ReleaseState) -> bool {
        use ReleaseState::*;

        if next == Failed {
            return !self.is_terminal();
        }

        matches!(
            (*self, next),
            (Idle, Fetching)
                | (Fetching, Classifying)
                | (Classifying, Resolving)
                | (Resolving, NoRelease)
                | (Resolving, Preparing)
                | (Preparing, NoRelease)
                | (Preparing, Publishing)
                | (Publishing, NoRelease)
                | (Publishing, Committing)
                | (Committing, Done)
        )
    }
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus every state visited so far, starting at `Idle`.
#[derive(Debug, Clone)]
pub struct StateMachine {
    history: Vec<ReleaseState>,
}

impl StateMachine {
    pub fn new() -> Self {
        StateMachine {
            history: vec![ReleaseState::Idle],
        }
    }

    pub fn current(&self) -> ReleaseState {
        self.history
            .last()
            .copied()
            .unwrap_or(ReleaseState::Idle)
    }

    pub fn history(&self) -> &[ReleaseState] {
        &self.history
    }

    pub fn into_history(self) -> Vec<ReleaseState> {
        self.history
    }

    /// Move to `next`, rejecting transitions missing from the table.
    pub fn advance(&mut self, next: ReleaseState) -> Result<()> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(ReleaseError::InvalidTransition {
                from: from.to_string(),
                to: next.to_string(),
            });
        }

        info!(from = %from, to = %next, "state transition");
        self.history.push(next);
        Ok(())
    }

    /// Enter `Failed` from wherever the run stopped. Returns the failed stage.
    pub fn fail(&mut self) -> ReleaseState {
        let stage = self.current();
        if !stage.is_terminal() {
            self.history.push(ReleaseState::Failed);
        }
        stage
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        StateMachine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReleaseState::*;

    #[test]
    fn test_happy_path_is_allowed() {
        let mut machine = StateMachine::new();
        for next in [Fetching, Classifying, Resolving, Preparing, Publishing, Committing, Done] {
            machine.advance(next).unwrap();
        }
        assert_eq!(machine.current(), Done);
        assert_eq!(machine.history().len(), 8);
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut machine = StateMachine::new();
        machine.advance(Fetching).unwrap();
        let err = machine.advance(Resolving).unwrap_err();
        assert_eq!(err.reason_code(), "invalid_transition");
        assert_eq!(machine.current(), Fetching);
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [NoRelease, Done, Failed] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Failed));
            assert!(!terminal.can_transition_to(Fetching));
        }
    }

    #[test]
    fn test_failed_from_any_running_state() {
        for state in [Idle, Fetching, Classifying, Resolving, Preparing, Publishing, Committing] {
            assert!(state.can_transition_to(Failed), "{} -> FAILED", state);
        }
    }

    #[test]
    fn test_fail_records_stage() {
        let mut machine = StateMachine::new();
        machine.advance(Fetching).unwrap();
        assert_eq!(machine.fail(), Fetching);
        assert_eq!(machine.history(), &[Idle, Fetching, Failed]);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(NoRelease.to_string(), "NO_RELEASE");
        assert_eq!(serde_json::to_string(&Committing).unwrap(), "\"COMMITTING\"");
    }
}
