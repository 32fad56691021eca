//! Setpoint arbitration and time-to-live.
//!
//! Each accepted setpoint becomes the single active [`ControlCommand`] with
//! an absolute expiry on the controller clock. A zero value is a stop in
//! every mode and is handled outside the arbiter.

use foc_common::state::{ControlMode, State};

/// Setpoint as issued by the facade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetpointRequest {
    pub mode: ControlMode,
    pub value: f64,
    /// Validity without renewal [s].
    pub ttl: f64,
}

impl SetpointRequest {
    pub const fn new(mode: ControlMode, value: f64, ttl: f64) -> Self {
        Self { mode, value, ttl }
    }

    /// The canonical stop command.
    pub const fn stop() -> Self {
        Self::new(ControlMode::RatiometricCurrent, 0.0, 0.0)
    }

    /// True for a zero value, whatever the mode.
    #[inline]
    pub fn is_stop(&self) -> bool {
        self.value == 0.0
    }

    /// Range checks independent of the controller state.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.value.is_finite() {
            return Err("setpoint value must be finite");
        }
        if !(self.ttl.is_finite() && self.ttl >= 0.0) {
            return Err("ttl must be finite and >= 0");
        }
        if self.mode.is_ratiometric() && self.value.abs() > 1.0 {
            return Err("ratiometric setpoint must be in [-1, 1]");
        }
        Ok(())
    }
}

/// The accepted setpoint with its absolute expiry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCommand {
    pub mode: ControlMode,
    pub value: f64,
    /// Controller time at acceptance [ns].
    pub issued_at_ns: u64,
    /// Controller time from which the command is expired [ns].
    pub expires_at_ns: u64,
}

impl ControlCommand {
    /// Build from a request accepted at `now_ns`.
    pub fn from_request(req: &SetpointRequest, now_ns: u64) -> Self {
        let ttl_ns = (req.ttl * 1e9).round() as u64;
        Self {
            mode: req.mode,
            value: req.value,
            issued_at_ns: now_ns,
            expires_at_ns: now_ns.saturating_add(ttl_ns),
        }
    }

    /// `now ≥ expiry`.
    #[inline]
    pub const fn is_expired(&self, now_ns: u64) -> bool {
        now_ns >= self.expires_at_ns
    }

    /// Requested direction of rotation, `1.0` or `-1.0`.
    #[inline]
    pub fn direction(&self) -> f64 {
        if self.value < 0.0 { -1.0 } else { 1.0 }
    }
}

/// Outcome of arbitrating a non-zero setpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arbitration {
    /// Idle: start spinning with this command.
    Start(ControlCommand),
    /// Spinup/Running: replace the active command, renewing its TTL.
    Update(ControlCommand),
    /// Not accepted; reason.
    Rejected(&'static str),
}

/// Holder of the active command.
#[derive(Debug, Clone, Default)]
pub struct SetpointArbiter {
    active: Option<ControlCommand>,
}

impl SetpointArbiter {
    pub const fn new() -> Self {
        Self { active: None }
    }

    /// Active command, if the motor is being driven.
    #[inline]
    pub const fn active(&self) -> Option<&ControlCommand> {
        self.active.as_ref()
    }

    /// Arbitrate a non-zero setpoint against the live state.
    ///
    /// Zero setpoints must go through the stop path instead.
    pub fn arbitrate(&mut self, req: &SetpointRequest, state: State, now_ns: u64) -> Arbitration {
        if req.is_stop() {
            return Arbitration::Rejected("zero setpoint is a stop");
        }
        if let Err(reason) = req.validate() {
            return Arbitration::Rejected(reason);
        }

        let cmd = ControlCommand::from_request(req, now_ns);
        match state {
            State::Idle => {
                self.active = Some(cmd);
                Arbitration::Start(cmd)
            }
            State::Spinup | State::Running => match self.active {
                Some(prev) if prev.direction() != cmd.direction() => {
                    Arbitration::Rejected("direction change requires a stop first")
                }
                _ => {
                    self.active = Some(cmd);
                    Arbitration::Update(cmd)
                }
            },
            State::MotorIdentification | State::HardwareTesting => {
                Arbitration::Rejected("busy: another activity owns the motor")
            }
            State::Fault => Arbitration::Rejected("fault latched: stop first"),
        }
    }

    /// Active command if it has expired at `now_ns`.
    #[inline]
    pub fn expired(&self, now_ns: u64) -> Option<ControlCommand> {
        self.active.filter(|c| c.is_expired(now_ns))
    }

    /// Drop the active command.
    #[inline]
    pub fn clear(&mut self) {
        self.active = None;
    }
}
