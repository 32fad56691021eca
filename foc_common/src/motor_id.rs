//! Motor identification modes.

use serde::{Deserialize, Serialize};

/// How much of the motor model the identification procedure measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    /// Rotor held still: resistance and inductance only.
    Static = 0,
    /// Additionally spins the unloaded motor to measure the flux linkage.
    RotationWithoutMechanicalLoad = 1,
}

impl Mode {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Static),
            1 => Some(Self::RotationWithoutMechanicalLoad),
            _ => None,
        }
    }

    /// True if the procedure rotates the motor.
    #[inline]
    pub const fn rotates(self) -> bool {
        matches!(self, Self::RotationWithoutMechanicalLoad)
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::Static
    }
}
