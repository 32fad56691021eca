//! Simulated motor and power stage.
//!
//! A surface-mount PMSM integrated in the rotor frame with sub-stepped
//! forward Euler, behind a [`PowerStage`] that reads back its currents. Used
//! by the integration tests, the benches and the `foc_sim` binary.
//!
//! ```text
//! di_d/dt = (u_d − R·i_d + ω·L_q·i_q) / L_d
//! di_q/dt = (u_q − R·i_q − ω·L_d·i_d − ω·φ) / L_q
//! J·dω_m/dt = 1.5·p·(φ·i_q + (L_d − L_q)·i_d·i_q) − B·ω_m − T_load
//! ```

use foc_common::params::MotorParameters;
use nalgebra::Vector2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::control::transforms::{inverse_park, park, wrap_angle};
use crate::driver::{Actuation, PowerStage, PowerStageError, Sample};

/// Plant description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Flux linkage [Wb].
    pub field_flux: f64,
    /// [H]
    pub inductance_d: f64,
    /// [H]
    pub inductance_q: f64,
    /// [Ω]
    pub resistance: f64,
    pub pole_pairs: u32,
    /// Rotor inertia [kg·m²].
    pub inertia: f64,
    /// Viscous friction [N·m·s/rad].
    pub friction: f64,
    /// Constant load torque opposing rotation [N·m].
    pub load_torque: f64,
    /// Bus voltage [V].
    pub inverter_voltage: f64,
    /// Standard deviation of the current measurement noise [A].
    pub current_noise: f64,
    /// Integration sub-steps per `advance`.
    pub substeps: u32,
    /// Noise generator seed.
    pub seed: u64,
    /// Initial electrical rotor angle [rad].
    pub initial_angle: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            field_flux: 0.03 / 7.0,
            inductance_d: 100e-6,
            inductance_q: 100e-6,
            resistance: 0.1,
            pole_pairs: 7,
            inertia: 1e-5,
            friction: 1e-3,
            load_torque: 0.0,
            inverter_voltage: 24.0,
            current_noise: 0.0,
            substeps: 10,
            seed: 0,
            initial_angle: 0.0,
        }
    }
}

impl SimulationConfig {
    /// Motor parameters that describe this plant exactly.
    pub fn motor_parameters(&self) -> MotorParameters {
        MotorParameters {
            field_flux: self.field_flux,
            inductance_d: self.inductance_d,
            inductance_q: self.inductance_q,
            resistance: self.resistance,
            num_poles: self.pole_pairs * 2,
            ..MotorParameters::default()
        }
    }
}

/// Rotor-frame electrical and mechanical state.
#[derive(Debug, Clone)]
pub struct SimulatedMotor {
    config: SimulationConfig,
    i_dq: Vector2<f64>,
    /// Electrical angular velocity [rad/s].
    velocity: f64,
    /// Electrical angle [rad].
    angle: f64,
}

impl SimulatedMotor {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            config: *config,
            i_dq: Vector2::zeros(),
            velocity: 0.0,
            angle: wrap_angle(config.initial_angle),
        }
    }

    /// Advance by `dt`. `None` means the bridge is off: the windings carry no
    /// current and the rotor coasts.
    pub fn step(&mut self, dt: f64, u_alpha_beta: Option<[f64; 2]>) {
        let c = self.config;
        let n = c.substeps.max(1);
        let h = dt / f64::from(n);
        let pp = f64::from(c.pole_pairs.max(1));

        for _ in 0..n {
            let torque = match u_alpha_beta {
                Some(u) => {
                    let u = park(&Vector2::from(u), self.angle);
                    let (id, iq, w) = (self.i_dq.x, self.i_dq.y, self.velocity);
                    let did = (u.x - c.resistance * id + w * c.inductance_q * iq) / c.inductance_d;
                    let diq = (u.y - c.resistance * iq - w * c.inductance_d * id - w * c.field_flux)
                        / c.inductance_q;
                    self.i_dq += Vector2::new(did, diq) * h;
                    1.5 * pp * (c.field_flux * iq + (c.inductance_d - c.inductance_q) * id * iq)
                }
                None => {
                    self.i_dq = Vector2::zeros();
                    0.0
                }
            };

            let w_mech = self.velocity / pp;
            let load = if w_mech != 0.0 {
                c.load_torque * w_mech.signum()
            } else {
                0.0
            };
            let accel = (torque - c.friction * w_mech - load) / c.inertia;
            self.velocity += accel * pp * h;
            self.angle = wrap_angle(self.angle + self.velocity * h);
        }
    }

    /// Phase currents in the stationary frame [A].
    pub fn phase_currents(&self) -> [f64; 2] {
        let i = inverse_park(&self.i_dq, self.angle);
        [i.x, i.y]
    }

    #[inline]
    pub fn idq(&self) -> Vector2<f64> {
        self.i_dq
    }

    /// Electrical angular velocity [rad/s].
    #[inline]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Electrical angle [rad].
    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Mechanical speed [RPM].
    pub fn mechanical_rpm(&self) -> f64 {
        self.velocity / f64::from(self.config.pole_pairs.max(1)) * 60.0 / core::f64::consts::TAU
    }

    /// Force the mechanical state, e.g. to start a test spinning.
    pub fn set_rotor(&mut self, velocity: f64, angle: f64) {
        self.velocity = velocity;
        self.angle = wrap_angle(angle);
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

/// Power stage driving a [`SimulatedMotor`].
///
/// `apply` only latches the actuation; [`advance`](Self::advance) integrates
/// the plant over the tick.
#[derive(Debug, Clone)]
pub struct SimulatedPowerStage {
    motor: SimulatedMotor,
    actuation: Actuation,
    inverter_voltage: f64,
    noise: Option<Normal<f64>>,
    rng: StdRng,
    disconnected: bool,
    calibration_failure: bool,
    calibrations: u32,
}

impl SimulatedPowerStage {
    pub fn new(config: &SimulationConfig) -> Self {
        let noise = if config.current_noise > 0.0 {
            Normal::new(0.0, config.current_noise).ok()
        } else {
            None
        };
        Self {
            motor: SimulatedMotor::new(config),
            actuation: Actuation::Disabled,
            inverter_voltage: config.inverter_voltage,
            noise,
            rng: StdRng::seed_from_u64(config.seed),
            disconnected: false,
            calibration_failure: false,
            calibrations: 0,
        }
    }

    /// Integrate the plant over `dt` with the latched actuation.
    pub fn advance(&mut self, dt: f64) {
        let u = match self.actuation {
            Actuation::Voltage(u) if !self.disconnected => Some(u),
            _ => None,
        };
        self.motor.step(dt, u);
    }

    #[inline]
    pub fn motor(&self) -> &SimulatedMotor {
        &self.motor
    }

    #[inline]
    pub fn motor_mut(&mut self) -> &mut SimulatedMotor {
        &mut self.motor
    }

    /// Latched actuation.
    #[inline]
    pub fn actuation(&self) -> Actuation {
        self.actuation
    }

    pub fn set_inverter_voltage(&mut self, volts: f64) {
        self.inverter_voltage = volts;
    }

    /// Simulate an open phase connection: no current can flow.
    pub fn set_disconnected(&mut self, disconnected: bool) {
        self.disconnected = disconnected;
    }

    pub fn set_calibration_failure(&mut self, fail: bool) {
        self.calibration_failure = fail;
    }

    /// Number of `calibrate` calls so far.
    #[inline]
    pub fn calibrations(&self) -> u32 {
        self.calibrations
    }
}

impl PowerStage for SimulatedPowerStage {
    fn calibrate(&mut self) -> Result<(), PowerStageError> {
        self.calibrations += 1;
        if self.calibration_failure {
            return Err(PowerStageError::Calibration(
                "current sensor offset out of range".to_string(),
            ));
        }
        Ok(())
    }

    fn sample(&mut self) -> Sample {
        let mut currents = if self.disconnected {
            [0.0, 0.0]
        } else {
            self.motor.phase_currents()
        };
        if let Some(noise) = &self.noise {
            for i in currents.iter_mut() {
                *i += noise.sample(&mut self.rng);
            }
        }
        Sample {
            phase_currents: currents,
            inverter_voltage: self.inverter_voltage,
        }
    }

    fn apply(&mut self, actuation: &Actuation) {
        self.actuation = *actuation;
    }
}
