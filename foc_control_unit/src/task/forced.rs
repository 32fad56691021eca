//! Open-loop forced-angle current drive.
//!
//! Shared by spin-up and rotating identification. The rotor is first pulled
//! to angle 0 with a d-axis current, then a q-axis current is applied in a
//! frame whose velocity grows at a fixed acceleration. A back-EMF estimator
//! runs in that forced frame so the caller can tell where the rotor really
//! is once it turns fast enough.

use foc_common::params::MotorParameters;
use nalgebra::Vector2;

use crate::control::back_emf::BackEmfEstimator;
use crate::control::pi::{PiGains, PiState, pi_compute};
use crate::control::transforms::{inverse_park, limit_magnitude, park, wrap_angle};
use crate::driver::{Actuation, Sample};

/// Forced-frame current drive.
#[derive(Debug, Clone)]
pub struct ForcedDrive {
    motor: MotorParameters,
    gains: PiGains,
    pi_d: PiState,
    pi_q: PiState,
    back_emf: BackEmfEstimator,
    /// Current amplitude [A].
    current: f64,
    /// `1.0` or `-1.0`.
    direction: f64,
    acceleration: f64,
    angle: f64,
    velocity: f64,
    last_idq: Vector2<f64>,
    last_udq: Vector2<f64>,
}

impl ForcedDrive {
    pub fn new(
        motor: &MotorParameters,
        bandwidth_hz: f64,
        back_emf_cutoff_hz: f64,
        current: f64,
        direction: f64,
        acceleration: f64,
    ) -> Self {
        Self {
            motor: *motor,
            gains: PiGains::current_loop(motor.inductance_q, motor.resistance, bandwidth_hz, 0.0),
            pi_d: PiState::default(),
            pi_q: PiState::default(),
            back_emf: BackEmfEstimator::new(back_emf_cutoff_hz),
            current,
            direction: if direction < 0.0 { -1.0 } else { 1.0 },
            acceleration: acceleration.abs(),
            angle: 0.0,
            velocity: 0.0,
            last_idq: Vector2::zeros(),
            last_udq: Vector2::zeros(),
        }
    }

    /// Hold `i_d = current` at angle 0.
    pub fn align_step(&mut self, dt: f64, sample: &Sample) -> Actuation {
        let i_dq = park(&Vector2::from(sample.phase_currents), 0.0);
        self.last_idq = i_dq;
        let u = self.regulate(dt, &i_dq, &Vector2::new(self.current, 0.0), 0.0, sample);
        self.emit(u, 0.0)
    }

    /// Switch from alignment to the forced ramp.
    pub fn begin_ramp(&mut self) {
        self.pi_d.reset();
        self.pi_q.reset();
        self.angle = 0.0;
        self.velocity = 0.0;
    }

    /// Drive the forced frame, accelerating until `|velocity|` reaches
    /// `target_velocity` and holding it there.
    pub fn ramp_step(&mut self, dt: f64, sample: &Sample, target_velocity: f64) -> Actuation {
        let i_dq = park(&Vector2::from(sample.phase_currents), self.angle);
        self.last_idq = i_dq;

        // Back-EMF from the voltage applied over the elapsed interval.
        self.back_emf
            .update(dt, &i_dq, &self.last_udq, self.velocity, &self.motor);

        let speed = (self.velocity.abs() + self.acceleration * dt).min(target_velocity.abs());
        self.velocity = self.direction * speed;
        self.angle = wrap_angle(self.angle + self.velocity * dt);

        let feed_forward = self.velocity * self.motor.field_flux;
        let reference = Vector2::new(0.0, self.direction * self.current);
        let u = self.regulate(dt, &i_dq, &reference, feed_forward, sample);
        self.emit(u, self.angle)
    }

    fn regulate(
        &mut self,
        dt: f64,
        i_dq: &Vector2<f64>,
        reference: &Vector2<f64>,
        q_feed_forward: f64,
        sample: &Sample,
    ) -> Vector2<f64> {
        let u_max = sample.max_phase_voltage();
        let gains = PiGains {
            out_max: u_max,
            ..self.gains
        };
        let mut u = Vector2::new(
            pi_compute(&mut self.pi_d, &gains, reference.x - i_dq.x, dt),
            pi_compute(&mut self.pi_q, &gains, reference.y - i_dq.y, dt) + q_feed_forward,
        );
        limit_magnitude(&mut u, u_max);
        u
    }

    fn emit(&mut self, u_dq: Vector2<f64>, angle: f64) -> Actuation {
        self.last_udq = u_dq;
        let u = inverse_park(&u_dq, angle);
        Actuation::Voltage([u.x, u.y])
    }

    /// Forced electrical angle [rad].
    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Forced electrical velocity [rad/s].
    #[inline]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    #[inline]
    pub fn direction(&self) -> f64 {
        self.direction
    }

    /// Currents measured in the forced frame this tick.
    #[inline]
    pub fn idq(&self) -> Vector2<f64> {
        self.last_idq
    }

    /// Voltage applied this tick, forced frame.
    #[inline]
    pub fn udq(&self) -> Vector2<f64> {
        self.last_udq
    }

    #[inline]
    pub fn back_emf(&self) -> &BackEmfEstimator {
        &self.back_emf
    }

    #[inline]
    pub fn motor(&self) -> &MotorParameters {
        &self.motor
    }
}
