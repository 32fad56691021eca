//! Power stage interface.
//!
//! The control core never talks to PWM timers or ADCs directly. A
//! [`PowerStage`] hands it one [`Sample`] per tick and executes the
//! [`Actuation`] the tick decides on. Both sides use the stationary α/β
//! frame; space-vector modulation and phase current reconstruction are the
//! driver's concern.

use thiserror::Error;

/// Measurements taken at the start of a control tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    /// Phase currents in the stationary α/β frame [A].
    pub phase_currents: [f64; 2],
    /// Inverter DC link voltage [V].
    pub inverter_voltage: f64,
}

impl Sample {
    /// Largest phase voltage amplitude reachable with linear SVPWM [V].
    #[inline]
    pub fn max_phase_voltage(&self) -> f64 {
        self.inverter_voltage.max(0.0) / 3.0_f64.sqrt()
    }
}

/// Output decided by a control tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Actuation {
    /// Bridge disabled (all switches off). The safe state.
    #[default]
    Disabled,
    /// Phase voltage vector in the α/β frame [V].
    Voltage([f64; 2]),
}

impl Actuation {
    /// Magnitude of the commanded voltage vector [V].
    #[inline]
    pub fn voltage_magnitude(&self) -> f64 {
        match self {
            Self::Disabled => 0.0,
            Self::Voltage([a, b]) => a.hypot(*b),
        }
    }

    /// True if the bridge is disabled.
    #[inline]
    pub const fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

/// Errors reported by a power stage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PowerStageError {
    /// Current sensor or gate driver calibration failed.
    #[error("power stage calibration failed: {0}")]
    Calibration(String),
}

/// Hardware behind the control core.
///
/// # Lifecycle
///
/// 1. `calibrate()` - once inside `init()`, before the tick starts, and
///    again when a hardware test begins
/// 2. `sample()` / `apply()` - once per control tick each
///
/// # Timing Contracts
///
/// | Operation | Max Duration | RT Constraint |
/// |-----------|--------------|---------------|
/// | `calibrate()` from `init()` | seconds | None (pre-RT) |
/// | `calibrate()` from a hardware test | one tick period | **HARD** |
/// | `sample()` | small fraction of a tick | **HARD** |
/// | `apply()` | small fraction of a tick | **HARD** |
pub trait PowerStage: Send {
    /// Calibrate current sensing and gate drivers.
    fn calibrate(&mut self) -> Result<(), PowerStageError>;

    /// Read the measurements for the current tick.
    fn sample(&mut self) -> Sample;

    /// Execute an actuation until the next tick.
    fn apply(&mut self, actuation: &Actuation);
}
