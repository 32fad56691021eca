//! Rotor state observer.
//!
//! Extended Kalman filter over the PMSM electrical model in the rotor (d/q)
//! frame. The state is `x = [i_d, i_q, ω, θ]`: estimated stator currents,
//! electrical angular velocity and electrical angle. Only the currents are
//! measured, so velocity and angle are inferred through the back-EMF
//! coupling terms of the model:
//!
//! ```text
//! di_d/dt = (u_d − R·i_d + ω·L_q·i_q) / L_d
//! di_q/dt = (u_q − R·i_q − ω·L_d·i_d − ω·φ) / L_q
//! dω/dt   = 0
//! dθ/dt   = ω
//! ```
//!
//! With a single pole pair the electrical quantities equal the mechanical
//! ones; otherwise the caller divides by the pole pair count.
//!
//! ## Step contract
//!
//! | Input                  | Behaviour                                          |
//! |------------------------|----------------------------------------------------|
//! | `0 < dt ≤ max_dt`      | predict + correct, `UpdateStatus::Nominal`         |
//! | `dt > max_dt`          | step clamped to `max_dt`, `UpdateStatus::Clamped`  |
//! | `dt ≤ 0` / non-finite  | `UpdateError::InvalidTimeStep`, state untouched    |
//! | non-finite result      | `UpdateError::Diverged`, previous state kept       |
//!
//! No allocation happens after construction; all matrices are fixed-size.

use foc_common::params::{MotorParameters, ObserverParameters};
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use thiserror::Error;

use crate::control::transforms::wrap_angle;

const IDX_ID: usize = 0;
const IDX_IQ: usize = 1;
const IDX_VELOCITY: usize = 2;
const IDX_ANGLE: usize = 3;

/// Degenerate construction input.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ObserverError {
    /// The model divides by both inductances.
    #[error("inductances must be positive and finite (L_d = {ld}, L_q = {lq})")]
    NonPositiveInductance { ld: f64, lq: f64 },

    /// Flux linkage or resistance is NaN or infinite.
    #[error("motor constant `{0}` is not finite")]
    NonFiniteConstant(&'static str),

    /// A covariance diagonal has a negative or non-finite entry
    /// (or a non-positive one, for the measurement noise).
    #[error("covariance `{0}` is not a valid diagonal")]
    InvalidCovariance(&'static str),

    /// Cross-coupling compensation outside `[0, 1]`.
    #[error("cross-coupling compensation {0} is outside [0, 1]")]
    CrossCouplingOutOfRange(f64),

    /// `max_dt` must be positive.
    #[error("max_dt must be positive, got {0}")]
    InvalidMaxStep(f64),
}

/// Outcome of a successful update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The full `dt` was used.
    Nominal,
    /// `dt` exceeded `max_dt` and was clamped.
    Clamped,
}

/// Update rejected; the estimate is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum UpdateError {
    /// `dt` is zero, negative or not finite.
    #[error("time step {0} is not a positive finite number")]
    InvalidTimeStep(f64),

    /// The recursion produced a non-finite state or covariance.
    #[error("estimate diverged; previous state kept")]
    Diverged,
}

/// Motor constants the model is built on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElectricalConstants {
    /// Flux linkage φ [Wb].
    pub field_flux: f64,
    /// L_d [H].
    pub inductance_d: f64,
    /// L_q [H].
    pub inductance_q: f64,
    /// R_s [Ω].
    pub resistance: f64,
}

impl From<&MotorParameters> for ElectricalConstants {
    fn from(m: &MotorParameters) -> Self {
        Self {
            field_flux: m.field_flux,
            inductance_d: m.inductance_d,
            inductance_q: m.inductance_q,
            resistance: m.resistance,
        }
    }
}

/// Extended Kalman filter estimating `[i_d, i_q, ω, θ]`.
#[derive(Debug, Clone)]
pub struct Observer {
    x: Vector4<f64>,
    p: Matrix4<f64>,
    q: Matrix4<f64>,
    r: Matrix2<f64>,
    c: Matrix2x4<f64>,
    cross_coupling: f64,
    max_dt: f64,
    motor: ElectricalConstants,
}

fn diagonal_ok(values: &[f64], strictly_positive: bool) -> bool {
    values
        .iter()
        .all(|v| v.is_finite() && if strictly_positive { *v > 0.0 } else { *v >= 0.0 })
}

impl Observer {
    /// Build an observer with zero initial state and covariance `P0`.
    pub fn new(
        params: &ObserverParameters,
        field_flux: f64,
        inductance_d: f64,
        inductance_q: f64,
        resistance: f64,
    ) -> Result<Self, ObserverError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(inductance_d) || !positive(inductance_q) {
            return Err(ObserverError::NonPositiveInductance {
                ld: inductance_d,
                lq: inductance_q,
            });
        }
        if !field_flux.is_finite() {
            return Err(ObserverError::NonFiniteConstant("field_flux"));
        }
        if !resistance.is_finite() {
            return Err(ObserverError::NonFiniteConstant("resistance"));
        }
        if !diagonal_ok(&params.q, false) {
            return Err(ObserverError::InvalidCovariance("Q"));
        }
        if !diagonal_ok(&params.r, true) {
            return Err(ObserverError::InvalidCovariance("R"));
        }
        if !diagonal_ok(&params.p0, false) {
            return Err(ObserverError::InvalidCovariance("P0"));
        }
        if !(0.0..=1.0).contains(&params.cross_coupling_compensation) {
            return Err(ObserverError::CrossCouplingOutOfRange(
                params.cross_coupling_compensation,
            ));
        }
        if !positive(params.max_dt) {
            return Err(ObserverError::InvalidMaxStep(params.max_dt));
        }

        Ok(Self {
            x: Vector4::zeros(),
            p: Matrix4::from_diagonal(&Vector4::from(params.p0)),
            q: Matrix4::from_diagonal(&Vector4::from(params.q)),
            r: Matrix2::from_diagonal(&Vector2::from(params.r)),
            c: Matrix2x4::new(
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0,
            ),
            cross_coupling: params.cross_coupling_compensation,
            max_dt: params.max_dt,
            motor: ElectricalConstants {
                field_flux,
                inductance_d,
                inductance_q,
                resistance,
            },
        })
    }

    /// Build an observer from a motor parameter set.
    pub fn from_motor(
        params: &ObserverParameters,
        motor: &MotorParameters,
    ) -> Result<Self, ObserverError> {
        Self::new(
            params,
            motor.field_flux,
            motor.inductance_d,
            motor.inductance_q,
            motor.resistance,
        )
    }

    /// Seed the initial estimate, e.g. from an open-loop spin-up.
    ///
    /// Only meaningful right after construction; the covariance stays `P0`.
    pub fn with_state(mut self, i_dq: Vector2<f64>, velocity: f64, angle: f64) -> Self {
        self.x = Vector4::new(i_dq.x, i_dq.y, velocity, wrap_angle(angle));
        self
    }

    /// One predict + correct cycle.
    ///
    /// `i_dq` is the current measured in the frame of the current estimate,
    /// `u_dq` the voltage applied during the elapsed interval.
    pub fn update(
        &mut self,
        dt: f64,
        i_dq: &Vector2<f64>,
        u_dq: &Vector2<f64>,
    ) -> Result<UpdateStatus, UpdateError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(UpdateError::InvalidTimeStep(dt));
        }
        let (dt, status) = if dt > self.max_dt {
            (self.max_dt, UpdateStatus::Clamped)
        } else {
            (dt, UpdateStatus::Nominal)
        };

        // ── Predict ─────────────────────────────────────────────
        let x_prior = self.x + self.derivatives(u_dq) * dt;
        let f = Matrix4::identity() + self.jacobian() * dt;
        let p_prior = f * self.p * f.transpose() + self.q * dt;

        // ── Correct ─────────────────────────────────────────────
        let innovation = i_dq - self.c * x_prior;
        let s = self.c * p_prior * self.c.transpose() + self.r;
        let Some(s_inv) = s.try_inverse() else {
            return Err(UpdateError::Diverged);
        };
        let k = p_prior * self.c.transpose() * s_inv;
        let mut x = x_prior + k * innovation;

        // Joseph form keeps P symmetric positive semi-definite.
        let i_kc = Matrix4::identity() - k * self.c;
        let mut p = i_kc * p_prior * i_kc.transpose() + k * self.r * k.transpose();
        p = (p + p.transpose()) * 0.5;

        // ── Cross-coupling compensation ────────────────────────
        let m = &self.motor;
        let d_omega = x[IDX_VELOCITY] - x_prior[IDX_VELOCITY];
        let gain = self.cross_coupling * dt * d_omega;
        x[IDX_ID] += gain * m.inductance_q * x[IDX_IQ] / m.inductance_d;
        x[IDX_IQ] -= gain * (m.inductance_d * x[IDX_ID] + m.field_flux) / m.inductance_q;

        x[IDX_ANGLE] = wrap_angle(x[IDX_ANGLE]);

        if !(x.iter().all(|v| v.is_finite()) && p.iter().all(|v| v.is_finite())) {
            return Err(UpdateError::Diverged);
        }

        self.x = x;
        self.p = p;
        Ok(status)
    }

    /// Model derivatives at the current estimate.
    fn derivatives(&self, u_dq: &Vector2<f64>) -> Vector4<f64> {
        let m = &self.motor;
        let (id, iq, w) = (self.x[IDX_ID], self.x[IDX_IQ], self.x[IDX_VELOCITY]);
        Vector4::new(
            (u_dq.x - m.resistance * id + w * m.inductance_q * iq) / m.inductance_d,
            (u_dq.y - m.resistance * iq - w * m.inductance_d * id - w * m.field_flux)
                / m.inductance_q,
            0.0,
            w,
        )
    }

    /// Jacobian of the model derivatives with respect to the state.
    fn jacobian(&self) -> Matrix4<f64> {
        let m = &self.motor;
        let (ld, lq) = (m.inductance_d, m.inductance_q);
        let (id, iq, w) = (self.x[IDX_ID], self.x[IDX_IQ], self.x[IDX_VELOCITY]);
        Matrix4::new(
            -m.resistance / ld, w * lq / ld, lq * iq / ld, 0.0, //
            -w * ld / lq, -m.resistance / lq, -(ld * id + m.field_flux) / lq, 0.0, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0,
        )
    }

    /// Estimated d/q currents [A].
    #[inline]
    pub fn idq(&self) -> Vector2<f64> {
        Vector2::new(self.x[IDX_ID], self.x[IDX_IQ])
    }

    /// Estimated electrical angular velocity [rad/s].
    #[inline]
    pub fn angular_velocity(&self) -> f64 {
        self.x[IDX_VELOCITY]
    }

    /// Estimated electrical angle [rad], in `(−π, π]`.
    #[inline]
    pub fn angular_position(&self) -> f64 {
        self.x[IDX_ANGLE]
    }

    /// Linear extrapolation of the angle `dt` seconds ahead, wrapped.
    ///
    /// Used for commutation between updates; it is not a new estimate.
    #[inline]
    pub fn interpolated_angular_position(&self, dt: f64) -> f64 {
        wrap_angle(self.x[IDX_ANGLE] + dt * self.x[IDX_VELOCITY])
    }

    /// Full state vector.
    #[inline]
    pub fn state(&self) -> &Vector4<f64> {
        &self.x
    }

    /// Error covariance.
    #[inline]
    pub fn covariance(&self) -> &Matrix4<f64> {
        &self.p
    }

    /// Motor constants used by the model.
    #[inline]
    pub fn constants(&self) -> &ElectricalConstants {
        &self.motor
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
