//! First-order low-pass filtering for telemetry and estimator signals.
//!
//! Zero cutoff disables the filter (input passes through).

use core::f64::consts::TAU;

/// Internal state of the 1st-order low-pass filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowPassState {
    /// Previous output.
    prev_output: f64,
}

impl LowPassState {
    /// Reset filter state to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Jump the filter to `value` without transient.
    #[inline]
    pub fn preload(&mut self, value: f64) {
        self.prev_output = value;
    }

    /// Last filter output.
    #[inline]
    pub fn value(&self) -> f64 {
        self.prev_output
    }
}

/// Apply one sample through the 1st-order low-pass filter.
///
/// ```text
/// alpha = 2π·fc·dt / (1 + 2π·fc·dt)
/// y[n] = y[n-1] + alpha × (x[n] - y[n-1])
/// ```
///
/// Returns `input` unchanged when `cutoff_hz <= 0.0` (disabled).
#[inline]
pub fn lowpass_apply(state: &mut LowPassState, cutoff_hz: f64, input: f64, dt: f64) -> f64 {
    if cutoff_hz <= 0.0 || dt <= 0.0 {
        state.prev_output = input;
        return input;
    }

    let omega = TAU * cutoff_hz * dt;
    let alpha = omega / (1.0 + omega);
    let output = state.prev_output + alpha * (input - state.prev_output);
    state.prev_output = output;
    output
}
