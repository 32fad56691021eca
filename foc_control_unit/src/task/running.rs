//! Closed-loop sensorless operation.
//!
//! Per tick, strictly in this order:
//!
//! 1. Overcurrent check on the measured α/β currents.
//! 2. One observer update with the currents measured in the predicted frame
//!    and the voltage applied over the elapsed interval.
//! 3. Stall supervision on the estimated velocity.
//! 4. Reference from the active command, slew-limited on the q axis.
//! 5. d/q PI current loops with decoupling feed-forward, vector-limited to
//!    the available phase voltage.
//! 6. Commutation at the angle interpolated to the middle of the next interval.

use foc_common::fault::FaultFlags;
use foc_common::params::{ControllerParameters, MotorParameters, Parameters};
use foc_common::state::ControlMode;
use nalgebra::Vector2;

use super::spinup::Handover;
use super::overcurrent;
use crate::command::arbitration::ControlCommand;
use crate::control::pi::{PiGains, PiState, pi_compute};
use crate::control::transforms::{inverse_park, limit_magnitude, park};
use crate::driver::{Actuation, Sample};
use crate::observer::{Observer, ObserverError, UpdateError, UpdateStatus};

/// Outcome of one running tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningStatus {
    Ok,
    /// The observer clamped an oversized time step.
    Clamped,
    /// Fault to latch, with its cause.
    Fault(FaultFlags, &'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStep {
    pub actuation: Actuation,
    pub status: RunningStatus,
}

impl RunningStep {
    fn fault(flags: FaultFlags, reason: &'static str) -> Self {
        Self {
            actuation: Actuation::Disabled,
            status: RunningStatus::Fault(flags, reason),
        }
    }
}

/// Snapshot of the running loop for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Estimate {
    pub idq: [f64; 2],
    pub udq: [f64; 2],
    pub velocity: f64,
    pub angle: f64,
}

/// Observer plus current/speed control.
#[derive(Debug, Clone)]
pub struct RunningLoop {
    observer: Observer,
    motor: MotorParameters,
    controller: ControllerParameters,
    current_gains: PiGains,
    speed_gains: PiGains,
    pi_d: PiState,
    pi_q: PiState,
    pi_speed: PiState,
    iq_reference: f64,
    last_udq: Vector2<f64>,
    stall_time: f64,
}

impl RunningLoop {
    /// Build from committed parameters and the spin-up handover.
    pub fn new(params: &Parameters, handover: &Handover) -> Result<Self, ObserverError> {
        let m = params.motor;
        let c = params.controller;
        let idq = Vector2::from(handover.idq);
        let udq = Vector2::from(handover.udq);
        let observer = Observer::from_motor(&params.observer, &m)?.with_state(
            idq,
            handover.velocity,
            handover.angle,
        );

        let w = handover.velocity;
        let mut pi_d = PiState::default();
        let mut pi_q = PiState::default();
        // Bumpless start: integrators carry the voltage spin-up ended with.
        pi_d.preload(udq.x + w * m.inductance_q * idq.y);
        pi_q.preload(udq.y - w * (m.inductance_d * idq.x + m.field_flux));
        let mut pi_speed = PiState::default();
        pi_speed.preload(idq.y);

        let speed_tt = if c.speed_ki > 0.0 { c.speed_kp / c.speed_ki } else { 0.0 };
        Ok(Self {
            observer,
            motor: m,
            controller: c,
            current_gains: PiGains::current_loop(
                m.inductance_q,
                m.resistance,
                c.current_loop_bandwidth,
                0.0,
            ),
            speed_gains: PiGains {
                kp: c.speed_kp,
                ki: c.speed_ki,
                tt: speed_tt,
                out_max: m.max_current,
            },
            pi_d,
            pi_q,
            pi_speed,
            iq_reference: idq.y,
            last_udq: udq,
            stall_time: 0.0,
        })
    }

    /// Advance one tick under `command`.
    pub fn step(&mut self, dt: f64, sample: &Sample, command: &ControlCommand) -> RunningStep {
        let m = self.motor;
        let c = self.controller;
        if overcurrent(sample, m.max_current * c.overcurrent_ratio) {
            return RunningStep::fault(FaultFlags::OVERCURRENT, "overcurrent while running");
        }

        // ── Estimate ────────────────────────────────────────────
        // The sample was taken one interval after the last estimate.
        let i_dq = park(
            &Vector2::from(sample.phase_currents),
            self.observer.interpolated_angular_position(dt),
        );
        let status = match self.observer.update(dt, &i_dq, &self.last_udq) {
            Ok(UpdateStatus::Nominal) => RunningStatus::Ok,
            Ok(UpdateStatus::Clamped) => RunningStatus::Clamped,
            Err(UpdateError::Diverged) => {
                return RunningStep::fault(FaultFlags::OBSERVER_DIVERGED, "observer diverged");
            }
            Err(UpdateError::InvalidTimeStep(_)) => {
                return RunningStep::fault(
                    FaultFlags::OBSERVER_DIVERGED,
                    "observer rejected time step",
                );
            }
        };
        let idq = self.observer.idq();
        let w = self.observer.angular_velocity();

        // ── Supervision ─────────────────────────────────────────
        if w.abs() < c.min_running_velocity {
            self.stall_time += dt;
            if self.stall_time >= c.stall_timeout {
                return RunningStep::fault(FaultFlags::STALL, "rotor stalled");
            }
        } else {
            self.stall_time = 0.0;
        }

        // ── Control law ─────────────────────────────────────────
        let u_max = sample.max_phase_voltage();
        let gains = PiGains {
            out_max: u_max,
            ..self.current_gains
        };
        let decouple_d = -w * m.inductance_q * idq.y;
        let decouple_q = w * (m.inductance_d * idq.x + m.field_flux);

        let ud = pi_compute(&mut self.pi_d, &gains, -idq.x, dt) + decouple_d;
        let uq = if command.mode == ControlMode::RatiometricVoltage {
            let uq = command.value * u_max;
            // Keep the current loop tracking so a switch back is bumpless.
            self.pi_q.preload(uq - decouple_q);
            self.iq_reference = idq.y;
            self.pi_speed.preload(idq.y);
            uq
        } else {
            let target = self.current_target(dt, command, w);
            let max_step = c.current_slew_rate * dt;
            self.iq_reference += (target - self.iq_reference).clamp(-max_step, max_step);
            pi_compute(&mut self.pi_q, &gains, self.iq_reference - idq.y, dt) + decouple_q
        };

        let mut u = Vector2::new(ud, uq);
        limit_magnitude(&mut u, u_max);
        self.last_udq = u;

        // Held constant over the next interval: commutate at its midpoint.
        let u_ab = inverse_park(&u, self.observer.interpolated_angular_position(0.5 * dt));
        RunningStep {
            actuation: Actuation::Voltage([u_ab.x, u_ab.y]),
            status,
        }
    }

    /// Unslewed q-axis current target for the current-based modes [A].
    fn current_target(&mut self, dt: f64, command: &ControlCommand, w: f64) -> f64 {
        let m = &self.motor;
        let target = match command.mode {
            ControlMode::Current => command.value,
            ControlMode::RatiometricCurrent => command.value * m.max_current,
            ControlMode::MechanicalRpm => {
                let pole_pairs = f64::from(m.pole_pairs().max(1));
                let error = (m.rpm_to_electrical(command.value) - w) / pole_pairs;
                pi_compute(&mut self.pi_speed, &self.speed_gains, error, dt)
            }
            ControlMode::RatiometricVoltage => self.iq_reference,
        };
        target.clamp(-m.max_current, m.max_current)
    }

    /// Current estimate and applied voltage.
    pub fn estimate(&self) -> Estimate {
        let idq = self.observer.idq();
        Estimate {
            idq: [idq.x, idq.y],
            udq: [self.last_udq.x, self.last_udq.y],
            velocity: self.observer.angular_velocity(),
            angle: self.observer.angular_position(),
        }
    }

    #[inline]
    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    /// q-axis current reference after slew limiting [A].
    #[inline]
    pub fn iq_reference(&self) -> f64 {
        self.iq_reference
    }
}
