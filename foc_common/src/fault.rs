//! Latched fault flags and benign stop reasons.
//!
//! Runtime faults never surface as errors from the control tick. They latch
//! a [`FaultFlags`] bit and move the controller to `State::Fault`, where the
//! motor stays off until a stop clears the flags. Benign stops (including
//! setpoint expiry) leave the controller in `State::Idle` and are reported
//! through [`StopReason`] instead.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Latched runtime fault flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FaultFlags: u16 {
        /// Phase current above the trip level.
        const OVERCURRENT           = 0x0001;
        /// Rotor velocity stayed below the running minimum.
        const STALL                 = 0x0002;
        /// Observer produced a non-finite estimate.
        const OBSERVER_DIVERGED     = 0x0004;
        /// Hardware test found a problem.
        const HARDWARE_TEST_FAILED  = 0x0008;
        /// Motor identification could not produce a consistent model.
        const IDENTIFICATION_FAILED = 0x0010;
        /// Inverter supply too low to drive the motor.
        const UNDERVOLTAGE          = 0x0020;
    }
}

impl Default for FaultFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Why the controller last returned to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StopReason {
    /// No stop has happened yet.
    None = 0,
    /// Zero setpoint or `stop()`.
    Commanded = 1,
    /// The active setpoint's time-to-live ran out.
    SetpointExpired = 2,
    /// Spin-up gave up without a hardware problem.
    SpinupFailed = 3,
    /// Motor identification finished.
    IdentificationComplete = 4,
    /// Hardware test finished without findings.
    HardwareTestPassed = 5,
}

impl StopReason {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Commanded),
            2 => Some(Self::SetpointExpired),
            3 => Some(Self::SpinupFailed),
            4 => Some(Self::IdentificationComplete),
            5 => Some(Self::HardwareTestPassed),
            _ => None,
        }
    }
}

impl Default for StopReason {
    fn default() -> Self {
        Self::None
    }
}
