//! Motor identification.
//!
//! | Phase | Drive | Measures |
//! |---|---|---|
//! | Resistance | `i_d = I` at angle 0 | `R = mean(u) / mean(i)` after settling |
//! | Decay | zero voltage | nothing; lets the current die out |
//! | Inductance | voltage step `U = R·I` on α | `L·Δi = ∫(U − R·i)dt` until `i ≥ I/2` |
//! | Flux (rotating modes only) | forced rotation at `identification_velocity` | `φ = mean(|E| / |ω|)` |
//!
//! The resistance phase also parks the rotor at angle 0, so the inductance
//! step runs along the d axis. `L_q` is reported equal to `L_d`.

use foc_common::fault::FaultFlags;
use foc_common::motor_id::Mode;
use foc_common::params::{MotorParameters, Parameters};
use nalgebra::Vector2;

use super::forced::ForcedDrive;
use super::{ControlTask, TaskFailure, TaskStep, overcurrent};
use crate::control::pi::{PiGains, PiState, pi_compute};
use crate::control::transforms::limit_magnitude;
use crate::driver::{Actuation, Sample};

const RESISTANCE_SETTLE: f64 = 0.2;
const RESISTANCE_MEASURE: f64 = 0.1;
const DECAY_TIME: f64 = 0.05;
const INDUCTANCE_TIMEOUT: f64 = 0.1;
const FLUX_HOLD: f64 = 0.3;
const FLUX_MEASURE: f64 = 0.15;

/// Identified electrical constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentifiedMotor {
    pub resistance: f64,
    pub inductance_d: f64,
    pub inductance_q: f64,
    /// Only measured by rotating modes.
    pub field_flux: Option<f64>,
}

impl IdentifiedMotor {
    /// Overwrite the measured constants in `motor`.
    pub fn apply_to(&self, motor: &mut MotorParameters) {
        motor.resistance = self.resistance;
        motor.inductance_d = self.inductance_d;
        motor.inductance_q = self.inductance_q;
        if let Some(flux) = self.field_flux {
            motor.field_flux = flux;
        }
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Resistance {
        pi_d: PiState,
        pi_q: PiState,
        sum_u: f64,
        sum_i: f64,
        samples: u32,
    },
    Decay,
    Inductance {
        voltage: f64,
        initial_current: f64,
        prev_current: f64,
        integral: f64,
    },
    Flux {
        drive: ForcedDrive,
        sum_ratio: f64,
        samples: u32,
    },
}

/// Tick-driven identification procedure.
#[derive(Debug, Clone)]
pub struct IdentificationTask {
    mode: Mode,
    params: Parameters,
    gains: PiGains,
    phase: Phase,
    phase_time: f64,
    last_u: Vector2<f64>,
    resistance: f64,
    inductance: f64,
}

fn fail(reason: &'static str) -> TaskFailure {
    TaskFailure::fault(reason, FaultFlags::IDENTIFICATION_FAILED)
}

impl IdentificationTask {
    pub fn new(mode: Mode, params: &Parameters) -> Self {
        let m = &params.motor;
        Self {
            mode,
            params: *params,
            gains: PiGains::current_loop(
                m.inductance_d,
                m.resistance,
                params.controller.current_loop_bandwidth,
                0.0,
            ),
            phase: Phase::Resistance {
                pi_d: PiState::default(),
                pi_q: PiState::default(),
                sum_u: 0.0,
                sum_i: 0.0,
                samples: 0,
            },
            phase_time: 0.0,
            last_u: Vector2::zeros(),
            resistance: 0.0,
            inductance: 0.0,
        }
    }

    #[inline]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.phase_time = 0.0;
    }

    fn output(&mut self, u: Vector2<f64>) -> Actuation {
        self.last_u = u;
        Actuation::Voltage([u.x, u.y])
    }

    fn finish(&self, field_flux: Option<f64>) -> TaskStep<IdentifiedMotor> {
        TaskStep::done(
            Actuation::Disabled,
            IdentifiedMotor {
                resistance: self.resistance,
                inductance_d: self.inductance,
                inductance_q: self.inductance,
                field_flux,
            },
        )
    }

    fn after_inductance(&mut self) -> TaskStep<IdentifiedMotor> {
        if !self.mode.rotates() {
            return self.finish(None);
        }
        let c = &self.params.controller;
        let mut motor = self.params.motor;
        motor.resistance = self.resistance;
        motor.inductance_d = self.inductance;
        motor.inductance_q = self.inductance;
        let mut drive = ForcedDrive::new(
            &motor,
            c.current_loop_bandwidth,
            c.back_emf_cutoff,
            c.identification_current,
            1.0,
            c.spinup_acceleration,
        );
        drive.begin_ramp();
        self.enter(Phase::Flux {
            drive,
            sum_ratio: 0.0,
            samples: 0,
        });
        TaskStep::running(Actuation::Voltage([0.0, 0.0]))
    }
}

impl ControlTask for IdentificationTask {
    type Output = IdentifiedMotor;

    fn step(&mut self, dt: f64, sample: &Sample) -> TaskStep<IdentifiedMotor> {
        let m = self.params.motor;
        let c = self.params.controller;
        if overcurrent(sample, m.max_current * c.overcurrent_ratio) {
            return TaskStep::failed(TaskFailure::fault(
                "overcurrent during identification",
                FaultFlags::OVERCURRENT | FaultFlags::IDENTIFICATION_FAILED,
            ));
        }
        self.phase_time += dt;
        let [i_alpha, i_beta] = sample.phase_currents;
        let current = c.identification_current;

        match &mut self.phase {
            Phase::Resistance {
                pi_d,
                pi_q,
                sum_u,
                sum_i,
                samples,
            } => {
                if self.phase_time > RESISTANCE_SETTLE {
                    // The previous output is what produced this tick's current.
                    *sum_u += self.last_u.x;
                    *sum_i += i_alpha;
                    *samples += 1;
                }
                if self.phase_time >= RESISTANCE_SETTLE + RESISTANCE_MEASURE {
                    let n = f64::from((*samples).max(1));
                    let (mean_u, mean_i) = (*sum_u / n, *sum_i / n);
                    if mean_i < 0.5 * current {
                        return TaskStep::failed(fail("no current response"));
                    }
                    let r = mean_u / mean_i;
                    if !(r.is_finite() && r > 0.0) {
                        return TaskStep::failed(fail("resistance out of range"));
                    }
                    self.resistance = r;
                    self.enter(Phase::Decay);
                    return TaskStep::running(self.output(Vector2::zeros()));
                }

                let u_max = sample.max_phase_voltage();
                let gains = PiGains {
                    out_max: u_max,
                    ..self.gains
                };
                let mut u = Vector2::new(
                    pi_compute(pi_d, &gains, current - i_alpha, dt),
                    pi_compute(pi_q, &gains, -i_beta, dt),
                );
                limit_magnitude(&mut u, u_max);
                TaskStep::running(self.output(u))
            }

            Phase::Decay => {
                if self.phase_time >= DECAY_TIME {
                    let voltage = self.resistance * current;
                    self.enter(Phase::Inductance {
                        voltage,
                        initial_current: i_alpha,
                        prev_current: i_alpha,
                        integral: 0.0,
                    });
                    return TaskStep::running(self.output(Vector2::new(voltage, 0.0)));
                }
                TaskStep::running(self.output(Vector2::zeros()))
            }

            Phase::Inductance {
                voltage,
                initial_current,
                prev_current,
                integral,
            } => {
                let r = self.resistance;
                *integral += dt * (*voltage - r * 0.5 * (*prev_current + i_alpha));
                *prev_current = i_alpha;

                let rise = i_alpha - *initial_current;
                if i_alpha >= 0.5 * current && rise > 0.0 {
                    let l = *integral / rise;
                    if !(l.is_finite() && l > 0.0) {
                        return TaskStep::failed(fail("inductance out of range"));
                    }
                    self.inductance = l;
                    return self.after_inductance();
                }
                if self.phase_time > INDUCTANCE_TIMEOUT {
                    return TaskStep::failed(fail("inductance step did not settle"));
                }
                let u = Vector2::new(*voltage, 0.0);
                TaskStep::running(self.output(u))
            }

            Phase::Flux {
                drive,
                sum_ratio,
                samples,
            } => {
                let target = c.identification_velocity;
                let actuation = drive.ramp_step(dt, sample, target);
                let at_speed = drive.velocity().abs() >= target;
                if !at_speed {
                    self.phase_time = 0.0;
                    return TaskStep::running(actuation);
                }
                if self.phase_time > FLUX_HOLD - FLUX_MEASURE {
                    *sum_ratio += drive.back_emf().magnitude() / drive.velocity().abs();
                    *samples += 1;
                }
                if self.phase_time >= FLUX_HOLD {
                    let flux = *sum_ratio / f64::from((*samples).max(1));
                    if !(flux.is_finite() && flux > 0.0) {
                        return TaskStep::failed(fail("flux linkage out of range"));
                    }
                    return self.finish(Some(flux));
                }
                TaskStep::running(actuation)
            }
        }
    }
}
