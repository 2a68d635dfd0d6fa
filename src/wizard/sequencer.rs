//! Step sequencing over a fixed, ordered step list.

use crate::error::{WizardError, WizardResult};
use std::fmt::Debug;

#[derive(Debug, Clone)]
pub struct StepSequencer<S: 'static> {
    steps: &'static [S],
    index: usize,
}

impl<S> StepSequencer<S>
where
    S: Copy + Eq + Debug + 'static,
{
    /// `steps` must not be empty.
    pub fn new(steps: &'static [S]) -> Self {
        debug_assert!(!steps.is_empty(), "a wizard needs at least one step");
        Self { steps, index: 0 }
    }

    pub fn current(&self) -> S {
        self.steps[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn steps(&self) -> &'static [S] {
        self.steps
    }

    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn is_last(&self) -> bool {
        self.index == self.last_index()
    }

    pub fn position(&self, step: S) -> Option<usize> {
        self.steps.iter().position(|s| *s == step)
    }

    /// Move forward one step when the current step's gate is open.
    ///
    /// On the last step a passing gate is a no-op (clamped).
    pub fn advance(&mut self, gate_open: bool) -> WizardResult<usize> {
        if !gate_open {
            return Err(WizardError::gate(self.current()));
        }
        self.index = (self.index + 1).min(self.last_index());
        Ok(self.index)
    }

    pub fn retreat(&mut self) -> usize {
        self.index = self.index.saturating_sub(1);
        self.index
    }

    /// Jump to any visited step, or to the next one if the current gate is open.
    pub fn go_to(&mut self, step: S, gate_open: bool) -> WizardResult<usize> {
        let target = self
            .position(step)
            .ok_or_else(|| WizardError::UnknownStep(format!("{step:?}")))?;
        if target > self.index + 1 {
            return Err(WizardError::StepOutOfReach {
                from: self.index,
                to: target,
            });
        }
        if target == self.index + 1 && !gate_open {
            return Err(WizardError::gate(self.current()));
        }
        self.index = target;
        Ok(self.index)
    }

    pub fn rewind(&mut self) {
        self.index = 0;
    }
}
