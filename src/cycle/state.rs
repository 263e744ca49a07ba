//! Cycle state machine

use crate::error::CycleError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CycleState {
    Configured,
    WindowComputed,
    SlotsReconciled,
    Fetched,
    Merged,
    Rendered,
    Dispatched,
    Done,
    Failed,
}

impl CycleState {
    /// The state that normally follows this one
    pub fn next(&self) -> Option<CycleState> {
        use CycleState::*;
        match self {
            Configured => Some(WindowComputed),
            WindowComputed => Some(SlotsReconciled),
            SlotsReconciled => Some(Fetched),
            Fetched => Some(Merged),
            Merged => Some(Rendered),
            Rendered => Some(Dispatched),
            Dispatched => Some(Done),
            Done | Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleState::Done | CycleState::Failed)
    }

    /// Forward by one step, `Rendered -> Done` when dispatch is skipped, or to `Failed`
    /// from any live state
    pub fn can_transition_to(&self, to: CycleState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == CycleState::Failed
            || self.next() == Some(to)
            || (*self == CycleState::Rendered && to == CycleState::Done)
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current state plus the path taken to reach it
#[derive(Debug, Clone)]
pub struct StateTracker {
    state: CycleState,
    history: Vec<CycleState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            state: CycleState::Configured,
            history: vec![CycleState::Configured],
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn history(&self) -> &[CycleState] {
        &self.history
    }

    pub fn advance(&mut self, to: CycleState) -> Result<(), CycleError> {
        if !self.state.can_transition_to(to) {
            return Err(CycleError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `Failed` unless already terminal
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = CycleState::Failed;
            self.history.push(CycleState::Failed);
        }
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
