//! `foc_sim` configuration file.
//!
//! ```toml
//! [shared]
//! service_name = "foc-sim"
//!
//! [cycle]
//! rate_hz = 10000.0
//! pacing = "free_running"
//!
//! [parameters.motor]
//! spinup_current = 2.0
//!
//! [motor]
//! load_torque = 0.0
//!
//! [scenario]
//! control_mode = "Current"
//! setpoint = 1.0
//! ```
//!
//! Every table except `[shared]` may be omitted and falls back to defaults.

use foc_common::config::{ConfigError, SharedConfig, Validate};
use foc_common::motor_id::Mode;
use foc_common::params::Parameters;
use foc_common::state::ControlMode;
use serde::{Deserialize, Serialize};

use crate::cycle::CycleConfig;
use crate::sim::SimulationConfig;

/// What the foreground thread does with the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Simulated run time [s].
    pub duration: f64,
    /// Identify the motor before spinning it, and with which procedure.
    pub identification: Option<Mode>,
    /// Run the hardware test before spinning.
    pub hardware_test: bool,
    pub control_mode: ControlMode,
    pub setpoint: f64,
    /// Setpoint time-to-live [s].
    pub setpoint_ttl: f64,
    /// Renewal period of the setpoint [s]. Must be shorter than the TTL.
    pub renew_interval: f64,
    /// Period of the status printout [s]; 0 disables it.
    pub status_interval: f64,
    /// Emit one plot line per renewal.
    pub plot: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            duration: 2.0,
            identification: None,
            hardware_test: false,
            control_mode: ControlMode::Current,
            setpoint: 1.0,
            setpoint_ttl: 0.5,
            renew_interval: 0.1,
            status_interval: 0.5,
            plot: false,
        }
    }
}

impl Validate for ScenarioConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(ConfigError::invalid("scenario.duration must be > 0"));
        }
        if !self.setpoint.is_finite() {
            return Err(ConfigError::invalid("scenario.setpoint must be finite"));
        }
        if !(self.renew_interval > 0.0 && self.renew_interval < self.setpoint_ttl) {
            return Err(ConfigError::invalid(
                "scenario.renew_interval must be > 0 and shorter than setpoint_ttl",
            ));
        }
        if !(self.status_interval >= 0.0) {
            return Err(ConfigError::invalid("scenario.status_interval must be >= 0"));
        }
        Ok(())
    }
}

/// Complete `foc_sim` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimAppConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub parameters: Parameters,
    /// Simulated plant.
    #[serde(default)]
    pub motor: SimulationConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

impl Validate for SimAppConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        if !(self.cycle.rate_hz.is_finite() && self.cycle.rate_hz > 0.0) {
            return Err(ConfigError::invalid("cycle.rate_hz must be > 0"));
        }
        self.parameters.validate()?;
        if self.motor.pole_pairs == 0 || !(self.motor.inertia > 0.0) {
            return Err(ConfigError::invalid(
                "motor.pole_pairs and motor.inertia must be > 0",
            ));
        }
        if !(self.motor.inductance_d > 0.0 && self.motor.inductance_q > 0.0) {
            return Err(ConfigError::invalid("motor inductances must be > 0"));
        }
        self.scenario.validate()
    }
}
