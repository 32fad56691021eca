//! Sensorless spin-up.
//!
//! ```text
//! Align ──(align_duration)──► Ramp ──(|ω_forced| ≥ handover_velocity)──► Handover
//!   │                           │
//!   └──── timeout / overcurrent ┴──► Failed
//! ```
//!
//! At handover the back-EMF measured in the forced frame gives the rotor's
//! offset from the forced angle. Its magnitude must match `|ω|·φ` within
//! `back_emf_tolerance`, otherwise the rotor is not following the field and
//! closed-loop estimation would start from garbage.

use foc_common::fault::FaultFlags;
use foc_common::params::{ControllerParameters, Parameters};
use nalgebra::{Rotation2, Vector2};

use super::forced::ForcedDrive;
use super::{ControlTask, TaskFailure, TaskStep, overcurrent};
use crate::control::transforms::wrap_angle;
use crate::driver::Sample;

/// Initial estimate handed to the running loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handover {
    /// Estimated electrical rotor angle [rad].
    pub angle: f64,
    /// Electrical velocity [rad/s].
    pub velocity: f64,
    /// Last measured currents in the rotor frame [A].
    pub idq: [f64; 2],
    /// Last applied voltage in the rotor frame [V].
    pub udq: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Align,
    Ramp,
}

/// Open-loop start of a stopped motor.
#[derive(Debug, Clone)]
pub struct SpinupTask {
    drive: ForcedDrive,
    controller: ControllerParameters,
    trip_current: f64,
    phase: Phase,
    elapsed: f64,
}

impl SpinupTask {
    /// `direction` is the sign of the requested rotation.
    pub fn new(params: &Parameters, direction: f64) -> Self {
        let c = &params.controller;
        let m = &params.motor;
        Self {
            drive: ForcedDrive::new(
                m,
                c.current_loop_bandwidth,
                c.back_emf_cutoff,
                m.spinup_current,
                direction,
                c.spinup_acceleration,
            ),
            controller: *c,
            trip_current: m.max_current * c.overcurrent_ratio,
            phase: Phase::Align,
            elapsed: 0.0,
        }
    }

    /// Forced electrical angle and velocity, for telemetry.
    pub fn forced_state(&self) -> (f64, f64) {
        (self.drive.angle(), self.drive.velocity())
    }

    /// Forced-frame currents and voltages, for telemetry.
    pub fn forced_dq(&self) -> (Vector2<f64>, Vector2<f64>) {
        (self.drive.idq(), self.drive.udq())
    }

    fn handover(&self) -> Result<Handover, TaskFailure> {
        let velocity = self.drive.velocity();
        let expected = velocity.abs() * self.drive.motor().field_flux;
        let back_emf = self.drive.back_emf();
        if (back_emf.magnitude() - expected).abs() > self.controller.back_emf_tolerance * expected {
            return Err(TaskFailure::benign("back-EMF does not match forced velocity"));
        }

        let offset = back_emf.angle_offset(velocity);
        let into_rotor = Rotation2::new(-offset);
        let idq = into_rotor * self.drive.idq();
        let udq = into_rotor * self.drive.udq();
        Ok(Handover {
            angle: wrap_angle(self.drive.angle() + offset),
            velocity,
            idq: [idq.x, idq.y],
            udq: [udq.x, udq.y],
        })
    }
}

impl ControlTask for SpinupTask {
    type Output = Handover;

    fn step(&mut self, dt: f64, sample: &Sample) -> TaskStep<Handover> {
        self.elapsed += dt;
        if overcurrent(sample, self.trip_current) {
            return TaskStep::failed(TaskFailure::fault(
                "overcurrent during spin-up",
                FaultFlags::OVERCURRENT,
            ));
        }
        if self.elapsed > self.controller.spinup_timeout {
            return TaskStep::failed(TaskFailure::benign("spin-up timed out"));
        }

        match self.phase {
            Phase::Align => {
                let actuation = self.drive.align_step(dt, sample);
                if self.elapsed >= self.controller.align_duration {
                    self.drive.begin_ramp();
                    self.phase = Phase::Ramp;
                }
                TaskStep::running(actuation)
            }
            Phase::Ramp => {
                let target = self.controller.handover_velocity;
                let actuation = self.drive.ramp_step(dt, sample, target);
                if self.drive.velocity().abs() < target {
                    return TaskStep::running(actuation);
                }
                match self.handover() {
                    Ok(handover) => TaskStep::done(actuation, handover),
                    Err(failure) => TaskStep::failed(failure),
                }
            }
        }
    }
}
