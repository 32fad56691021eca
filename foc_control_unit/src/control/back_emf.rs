//! Back-EMF estimation in an arbitrary rotating frame.
//!
//! While the motor is driven open-loop at a forced angle θ_f, the rotor
//! lags or leads that frame by an unknown offset δ. The back-EMF vector is
//! `ω·φ` along the rotor q axis, so its direction in the forced frame
//! reveals δ and its magnitude confirms the rotor actually follows the
//! forced velocity.
//!
//! ```text
//! E_d = u_d − R·i_d + ω·L_q·i_q
//! E_q = u_q − R·i_q − ω·L_d·i_d
//! δ   = atan2(−E_d·sgn ω, E_q·sgn ω)
//! ```

use foc_common::params::MotorParameters;
use nalgebra::Vector2;

use super::filters::{LowPassState, lowpass_apply};

/// Low-pass filtered back-EMF in the frame the measurements are taken in.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackEmfEstimator {
    e_d: LowPassState,
    e_q: LowPassState,
    cutoff_hz: f64,
}

impl BackEmfEstimator {
    /// Create an estimator with the given low-pass cutoff.
    pub fn new(cutoff_hz: f64) -> Self {
        Self {
            cutoff_hz,
            ..Default::default()
        }
    }

    /// Feed one sample.
    ///
    /// `i_dq` is measured in the frame where `u_dq` was applied during the
    /// previous interval, and `omega` is that frame's velocity over the same
    /// interval.
    pub fn update(
        &mut self,
        dt: f64,
        i_dq: &Vector2<f64>,
        u_dq: &Vector2<f64>,
        omega: f64,
        motor: &MotorParameters,
    ) {
        let raw_d = u_dq.x - motor.resistance * i_dq.x + omega * motor.inductance_q * i_dq.y;
        let raw_q = u_dq.y - motor.resistance * i_dq.y - omega * motor.inductance_d * i_dq.x;
        lowpass_apply(&mut self.e_d, self.cutoff_hz, raw_d, dt);
        lowpass_apply(&mut self.e_q, self.cutoff_hz, raw_q, dt);
    }

    /// Filtered back-EMF vector `[E_d, E_q]` [V].
    #[inline]
    pub fn value(&self) -> Vector2<f64> {
        Vector2::new(self.e_d.value(), self.e_q.value())
    }

    /// Filtered back-EMF magnitude [V].
    #[inline]
    pub fn magnitude(&self) -> f64 {
        self.value().norm()
    }

    /// Rotor angle relative to the measurement frame for rotation in the
    /// direction of `omega`.
    pub fn angle_offset(&self, omega: f64) -> f64 {
        let s = if omega < 0.0 { -1.0 } else { 1.0 };
        let e = self.value();
        (-e.x * s).atan2(e.y * s)
    }
}
