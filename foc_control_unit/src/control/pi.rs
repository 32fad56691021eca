//! PI controller with backward Euler integration and anti-windup via
//! back-calculation (Tt).
//!
//! Used for the d/q current loops and the speed loop. Zero Ki disables the
//! integrator.

use core::f64::consts::TAU;

/// Internal state of a PI controller.
///
/// Reset (or preloaded) whenever the controller takes over from a different
/// drive regime, e.g. at the spin-up handover.
#[derive(Debug, Clone, Copy, Default)]
pub struct PiState {
    /// Integral accumulator (already multiplied by Ki).
    integral: f64,
    /// Previous unsaturated output, for anti-windup.
    prev_raw_output: f64,
}

impl PiState {
    /// Reset all internal state to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start from a known output, so the first cycle continues smoothly.
    #[inline]
    pub fn preload(&mut self, output: f64) {
        self.integral = output;
        self.prev_raw_output = output;
    }

    /// Current integral term.
    #[inline]
    pub fn integral(&self) -> f64 {
        self.integral
    }
}

/// PI gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain (0 = disabled).
    pub ki: f64,
    /// Anti-windup tracking time constant [s] (0 = disabled).
    pub tt: f64,
    /// Output saturation limit (symmetric).
    pub out_max: f64,
}

impl PiGains {
    /// Current loop gains from the motor model and a target bandwidth.
    ///
    /// Pole-zero cancellation of the R-L plant: `Kp = L·2π·bw`,
    /// `Ki = R·2π·bw`, giving a first-order closed loop at `bw`.
    pub fn current_loop(inductance: f64, resistance: f64, bandwidth_hz: f64, out_max: f64) -> Self {
        let wc = TAU * bandwidth_hz;
        Self {
            kp: inductance * wc,
            ki: resistance * wc,
            tt: 1.0 / wc,
            out_max,
        }
    }
}

/// Compute one PI cycle. Returns the unsaturated output; the caller limits
/// it together with any feed-forward terms.
#[inline]
pub fn pi_compute(state: &mut PiState, gains: &PiGains, error: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        return state.prev_raw_output;
    }

    let p_term = gains.kp * error;

    let i_term = if gains.ki != 0.0 {
        // Back-calculation: bleed the integrator while the last output sat
        // beyond the limit.
        let anti_windup = if gains.tt > 0.0 && gains.out_max > 0.0 {
            let saturated = state.prev_raw_output.clamp(-gains.out_max, gains.out_max);
            (saturated - state.prev_raw_output) / gains.tt
        } else {
            0.0
        };
        state.integral += (gains.ki * error + anti_windup) * dt;
        state.integral
    } else {
        state.integral = 0.0;
        0.0
    };

    let raw_output = p_term + i_term;
    state.prev_raw_output = raw_output;
    raw_output
}

// ─── Tests ──────────────────────────────────────────────────────────
