//! Parameter sets consumed by the control core.
//!
//! All sets are `Copy` snapshots. The controller double-buffers
//! [`Parameters`]: a newly set value is staged and committed only when a
//! state transition is taken, so a running control cycle never sees a torn
//! update.
//!
//! Every struct is `#[serde(default)]`, so a TOML file only needs the fields
//! it overrides.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, Validate};

fn require(cond: bool, msg: &str) -> Result<(), ConfigError> {
    if cond {
        Ok(())
    } else {
        Err(ConfigError::invalid(msg))
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

// ─── Motor ──────────────────────────────────────────────────────────

/// Electrical constants and current limits of the motor.
///
/// Flux linkage and inductances are per-phase values in the electrical
/// domain (d/q frame, amplitude-invariant transform).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorParameters {
    /// Permanent magnet flux linkage φ [Wb].
    pub field_flux: f64,
    /// Direct-axis inductance L_d [H].
    pub inductance_d: f64,
    /// Quadrature-axis inductance L_q [H].
    pub inductance_q: f64,
    /// Stator phase resistance R_s [Ω].
    pub resistance: f64,
    /// Number of magnetic poles (even).
    pub num_poles: u32,
    /// Phase current limit [A].
    pub max_current: f64,
    /// Current used to align and accelerate the rotor during spin-up [A].
    pub spinup_current: f64,
}

impl Default for MotorParameters {
    fn default() -> Self {
        Self {
            field_flux: 0.03 / 7.0,
            inductance_d: 100e-6,
            inductance_q: 100e-6,
            resistance: 0.1,
            num_poles: 14,
            max_current: 10.0,
            spinup_current: 2.0,
        }
    }
}

impl MotorParameters {
    /// Number of pole pairs (electrical revolutions per mechanical revolution).
    #[inline]
    pub const fn pole_pairs(&self) -> u32 {
        self.num_poles / 2
    }

    /// Convert an electrical angular velocity [rad/s] to mechanical RPM.
    #[inline]
    pub fn electrical_to_rpm(&self, omega_el: f64) -> f64 {
        omega_el / f64::from(self.pole_pairs().max(1)) * 60.0 / core::f64::consts::TAU
    }

    /// Convert mechanical RPM to electrical angular velocity [rad/s].
    #[inline]
    pub fn rpm_to_electrical(&self, rpm: f64) -> f64 {
        rpm * core::f64::consts::TAU / 60.0 * f64::from(self.pole_pairs().max(1))
    }
}

impl Validate for MotorParameters {
    fn validate(&self) -> Result<(), ConfigError> {
        require(positive(self.field_flux), "motor.field_flux must be > 0")?;
        require(positive(self.inductance_d), "motor.inductance_d must be > 0")?;
        require(positive(self.inductance_q), "motor.inductance_q must be > 0")?;
        require(positive(self.resistance), "motor.resistance must be > 0")?;
        require(
            self.num_poles >= 2 && self.num_poles % 2 == 0,
            "motor.num_poles must be even and >= 2",
        )?;
        require(positive(self.max_current), "motor.max_current must be > 0")?;
        require(
            positive(self.spinup_current) && self.spinup_current <= self.max_current,
            "motor.spinup_current must be in (0, max_current]",
        )
    }
}

// ─── Observer ───────────────────────────────────────────────────────

/// Tuning of the rotor state observer.
///
/// Covariances are diagonal; index order is `[i_d, i_q, ω, θ]` for the
/// state and `[i_d, i_q]` for the measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverParameters {
    /// Process noise covariance diagonal (scaled by dt at each prediction).
    pub q: [f64; 4],
    /// Measurement noise covariance diagonal.
    pub r: [f64; 2],
    /// Initial error covariance diagonal.
    pub p0: [f64; 4],
    /// Blend factor of the d/q cross-coupling correction, `[0, 1]`.
    pub cross_coupling_compensation: f64,
    /// Largest time step accepted by one update; longer steps are clamped [s].
    pub max_dt: f64,
}

impl Default for ObserverParameters {
    fn default() -> Self {
        Self {
            q: [100.0, 100.0, 1000.0, 5.0],
            r: [0.01, 0.01],
            p0: [100.0, 100.0, 5000.0, 5000.0],
            cross_coupling_compensation: 0.5,
            max_dt: 1e-3,
        }
    }
}

impl Validate for ObserverParameters {
    fn validate(&self) -> Result<(), ConfigError> {
        require(
            self.q.iter().chain(self.p0.iter()).all(|v| v.is_finite() && *v >= 0.0),
            "observer.q and observer.p0 entries must be finite and >= 0",
        )?;
        require(
            self.r.iter().all(|v| positive(*v)),
            "observer.r entries must be > 0",
        )?;
        require(
            (0.0..=1.0).contains(&self.cross_coupling_compensation),
            "observer.cross_coupling_compensation must be in [0, 1]",
        )?;
        require(positive(self.max_dt), "observer.max_dt must be > 0")
    }
}

// ─── Controller ─────────────────────────────────────────────────────

/// Control loop, spin-up, protection and self-test settings.
///
/// Velocities are electrical [rad/s] unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerParameters {
    /// Closed-loop bandwidth of the d/q current controllers [Hz].
    pub current_loop_bandwidth: f64,
    /// Speed loop proportional gain [A per mechanical rad/s].
    pub speed_kp: f64,
    /// Speed loop integral gain [A per mechanical rad].
    pub speed_ki: f64,
    /// Slew rate limit of the quadrature current reference [A/s].
    pub current_slew_rate: f64,

    /// Rotor alignment time before the open-loop ramp [s].
    pub align_duration: f64,
    /// Forced-angle acceleration during spin-up [rad/s²].
    pub spinup_acceleration: f64,
    /// Forced velocity at which the observer takes over [rad/s].
    pub handover_velocity: f64,
    /// Spin-up is abandoned after this time [s].
    pub spinup_timeout: f64,
    /// Allowed relative deviation of the back-EMF magnitude at handover.
    pub back_emf_tolerance: f64,
    /// Cutoff of the back-EMF estimator's low-pass filter [Hz].
    pub back_emf_cutoff: f64,

    /// Below this speed the rotor counts as stalled [rad/s].
    pub min_running_velocity: f64,
    /// Continuous time below `min_running_velocity` that latches a stall [s].
    pub stall_timeout: f64,
    /// Overcurrent trips at `max_current * overcurrent_ratio`.
    pub overcurrent_ratio: f64,

    /// Cutoff of the telemetry low-pass filters [Hz].
    pub telemetry_cutoff: f64,
    /// Amplitude of the beep tone [V].
    pub beep_voltage: f64,

    /// Regulated current used by motor identification [A].
    pub identification_current: f64,
    /// Forced velocity at which the flux linkage is measured [rad/s].
    pub identification_velocity: f64,

    /// Voltage applied per axis by the hardware test [V].
    pub hw_test_voltage: f64,
    /// Lowest acceptable inverter supply voltage [V].
    pub min_inverter_voltage: f64,
    /// Highest acceptable inverter supply voltage [V].
    pub max_inverter_voltage: f64,
    /// Largest acceptable zero-current reading with the bridge off [A].
    pub max_current_offset: f64,
    /// Smallest acceptable current response to the test voltage [A].
    pub min_phase_current: f64,
}

impl Default for ControllerParameters {
    fn default() -> Self {
        Self {
            current_loop_bandwidth: 500.0,
            speed_kp: 0.05,
            speed_ki: 0.5,
            current_slew_rate: 100.0,
            align_duration: 0.1,
            spinup_acceleration: 1500.0,
            handover_velocity: 200.0,
            spinup_timeout: 2.0,
            back_emf_tolerance: 0.5,
            back_emf_cutoff: 32.0,
            min_running_velocity: 50.0,
            stall_timeout: 0.25,
            overcurrent_ratio: 1.5,
            telemetry_cutoff: 10.0,
            beep_voltage: 0.5,
            identification_current: 2.0,
            identification_velocity: 300.0,
            hw_test_voltage: 0.2,
            min_inverter_voltage: 8.0,
            max_inverter_voltage: 60.0,
            max_current_offset: 0.5,
            min_phase_current: 0.2,
        }
    }
}

impl Validate for ControllerParameters {
    fn validate(&self) -> Result<(), ConfigError> {
        require(
            positive(self.current_loop_bandwidth),
            "controller.current_loop_bandwidth must be > 0",
        )?;
        require(
            self.speed_kp.is_finite() && self.speed_kp >= 0.0,
            "controller.speed_kp must be >= 0",
        )?;
        require(
            self.speed_ki.is_finite() && self.speed_ki >= 0.0,
            "controller.speed_ki must be >= 0",
        )?;
        require(positive(self.current_slew_rate), "controller.current_slew_rate must be > 0")?;
        require(
            self.align_duration.is_finite() && self.align_duration >= 0.0,
            "controller.align_duration must be >= 0",
        )?;
        require(
            positive(self.spinup_acceleration),
            "controller.spinup_acceleration must be > 0",
        )?;
        require(positive(self.handover_velocity), "controller.handover_velocity must be > 0")?;
        require(
            positive(self.spinup_timeout)
                && self.spinup_timeout
                    > self.align_duration + self.handover_velocity / self.spinup_acceleration,
            "controller.spinup_timeout must exceed alignment plus ramp time",
        )?;
        require(
            self.back_emf_tolerance > 0.0 && self.back_emf_tolerance < 1.0,
            "controller.back_emf_tolerance must be in (0, 1)",
        )?;
        require(positive(self.back_emf_cutoff), "controller.back_emf_cutoff must be > 0")?;
        require(
            self.min_running_velocity.is_finite()
                && self.min_running_velocity >= 0.0
                && self.min_running_velocity < self.handover_velocity,
            "controller.min_running_velocity must be in [0, handover_velocity)",
        )?;
        require(positive(self.stall_timeout), "controller.stall_timeout must be > 0")?;
        require(
            self.overcurrent_ratio.is_finite() && self.overcurrent_ratio >= 1.0,
            "controller.overcurrent_ratio must be >= 1",
        )?;
        require(positive(self.telemetry_cutoff), "controller.telemetry_cutoff must be > 0")?;
        require(positive(self.beep_voltage), "controller.beep_voltage must be > 0")?;
        require(
            positive(self.identification_current),
            "controller.identification_current must be > 0",
        )?;
        require(
            positive(self.identification_velocity),
            "controller.identification_velocity must be > 0",
        )?;
        require(positive(self.hw_test_voltage), "controller.hw_test_voltage must be > 0")?;
        require(
            positive(self.min_inverter_voltage)
                && self.max_inverter_voltage > self.min_inverter_voltage,
            "controller inverter voltage range must satisfy 0 < min < max",
        )?;
        require(positive(self.max_current_offset), "controller.max_current_offset must be > 0")?;
        require(positive(self.min_phase_current), "controller.min_phase_current must be > 0")
    }
}

// ─── Aggregate ──────────────────────────────────────────────────────

/// Complete parameter set of one controller instance.
///
/// # TOML Example
///
/// ```toml
/// [parameters.motor]
/// resistance = 0.08
/// num_poles = 14
///
/// [parameters.observer]
/// q = [100.0, 100.0, 1000.0, 5.0]
///
/// [parameters.controller]
/// handover_velocity = 250.0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Motor electrical constants and limits.
    pub motor: MotorParameters,
    /// Observer tuning.
    pub observer: ObserverParameters,
    /// Control and protection settings.
    pub controller: ControllerParameters,
}

impl Validate for Parameters {
    fn validate(&self) -> Result<(), ConfigError> {
        self.motor.validate()?;
        self.observer.validate()?;
        self.controller.validate()?;
        require(
            self.controller.identification_current <= self.motor.max_current,
            "controller.identification_current must not exceed motor.max_current",
        )
    }
}
