//! Double-buffered parameters.
//!
//! `set_parameters` writes the staged slot; the control tick promotes it to
//! the committed slot only when a state transition is taken.

use foc_common::params::{MotorParameters, Parameters};

/// Staged and committed parameter sets.
#[derive(Debug, Clone, Default)]
pub struct ParameterSlots {
    staged: Option<Parameters>,
    committed: Parameters,
}

impl ParameterSlots {
    pub const fn new(committed: Parameters) -> Self {
        Self {
            staged: None,
            committed,
        }
    }

    /// Replace the staged set. A later call overwrites an earlier one.
    pub fn stage(&mut self, params: Parameters) {
        self.staged = Some(params);
    }

    /// Last staged-or-committed value.
    #[inline]
    pub fn latest(&self) -> Parameters {
        self.staged.unwrap_or(self.committed)
    }

    /// Parameters in effect.
    #[inline]
    pub const fn committed(&self) -> &Parameters {
        &self.committed
    }

    /// True while a staged set waits for a transition.
    #[inline]
    pub const fn has_pending(&self) -> bool {
        self.staged.is_some()
    }

    /// Promote the staged set. Returns the new committed set if one was
    /// pending.
    pub fn commit(&mut self) -> Option<Parameters> {
        let staged = self.staged.take()?;
        self.committed = staged;
        Some(staged)
    }

    /// Overwrite the motor constants in both slots with identified values.
    pub fn replace_motor(&mut self, motor: MotorParameters) {
        self.committed.motor = motor;
        if let Some(staged) = self.staged.as_mut() {
            staged.motor = motor;
        }
    }
}
