//! Controller state and control mode enums.
//!
//! Both enums use `#[repr(u8)]` so they can travel through atomics and
//! compact telemetry records without translation tables.

use serde::{Deserialize, Serialize};

// ─── Controller State ───────────────────────────────────────────────

/// Operating state of the control logic.
///
/// Some facade operations are only accepted in particular states; see the
/// transition table on `ControllerStateMachine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum State {
    /// Doing nothing and ready to accept commands.
    Idle = 0,
    /// Motor identification in progress; commands are not accepted.
    MotorIdentification = 1,
    /// Hardware self-test in progress. Passed → Idle, failed → Fault.
    HardwareTesting = 2,
    /// Transient start-up of a stopped motor. Succeeds → Running.
    Spinup = 3,
    /// Closed-loop sensorless operation.
    Running = 4,
    /// Serious error; the motor stays off until a stop clears it.
    Fault = 5,
}

impl State {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::MotorIdentification),
            2 => Some(Self::HardwareTesting),
            3 => Some(Self::Spinup),
            4 => Some(Self::Running),
            5 => Some(Self::Fault),
            _ => None,
        }
    }

    /// Short human-readable name used in status output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::MotorIdentification => "MotorID",
            Self::HardwareTesting => "HWTest",
            Self::Spinup => "Spinup",
            Self::Running => "Running",
            Self::Fault => "Fault",
        }
    }

    /// True while the motor is being driven towards or at a setpoint.
    #[inline]
    pub const fn is_motor_active(self) -> bool {
        matches!(self, Self::Spinup | Self::Running)
    }

    /// True while a non-zero setpoint may be accepted.
    #[inline]
    pub const fn accepts_setpoint(self) -> bool {
        matches!(self, Self::Idle | Self::Spinup | Self::Running)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::Idle
    }
}

impl core::fmt::Display for State {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Control Mode ───────────────────────────────────────────────────

/// Interpretation of a setpoint value.
///
/// Negative values request reverse rotation in every mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ControlMode {
    /// Fraction of `max_current` in `[-1, 1]`.
    RatiometricCurrent = 0,
    /// Fraction of the available phase voltage in `[-1, 1]`.
    RatiometricVoltage = 1,
    /// Quadrature current [A].
    Current = 2,
    /// Mechanical angular velocity [RPM].
    MechanicalRpm = 3,
}

impl ControlMode {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::RatiometricCurrent),
            1 => Some(Self::RatiometricVoltage),
            2 => Some(Self::Current),
            3 => Some(Self::MechanicalRpm),
            _ => None,
        }
    }

    /// True for the modes whose value is a fraction in `[-1, 1]`.
    #[inline]
    pub const fn is_ratiometric(self) -> bool {
        matches!(self, Self::RatiometricCurrent | Self::RatiometricVoltage)
    }
}

impl Default for ControlMode {
    fn default() -> Self {
        Self::RatiometricCurrent
    }
}
