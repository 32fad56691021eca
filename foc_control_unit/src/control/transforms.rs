//! Reference frame transforms and angle arithmetic.
//!
//! Stationary-frame quantities are α/β, rotor-frame quantities are d/q
//! (amplitude-invariant).

use core::f64::consts::{PI, TAU};

use nalgebra::Vector2;

/// Wrap an angle into `(−π, π]`.
///
/// Non-finite input yields NaN; callers check finiteness where it matters.
#[inline]
pub fn wrap_angle(x: f64) -> f64 {
    let wrapped = x - TAU * ((x - PI) / TAU).ceil();
    // Rounding at the boundaries can land one ulp outside.
    if wrapped <= -PI {
        wrapped + TAU
    } else if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// α/β → d/q at rotor angle `angle`.
#[inline]
pub fn park(alpha_beta: &Vector2<f64>, angle: f64) -> Vector2<f64> {
    let (s, c) = angle.sin_cos();
    Vector2::new(
        c * alpha_beta.x + s * alpha_beta.y,
        -s * alpha_beta.x + c * alpha_beta.y,
    )
}

/// d/q → α/β at rotor angle `angle`.
#[inline]
pub fn inverse_park(dq: &Vector2<f64>, angle: f64) -> Vector2<f64> {
    let (s, c) = angle.sin_cos();
    Vector2::new(c * dq.x - s * dq.y, s * dq.x + c * dq.y)
}

/// Scale `v` down to magnitude `max` if it is longer. Returns true if limited.
#[inline]
pub fn limit_magnitude(v: &mut Vector2<f64>, max: f64) -> bool {
    let norm = v.norm();
    if norm > max && norm > 0.0 {
        *v *= max.max(0.0) / norm;
        true
    } else {
        false
    }
}
