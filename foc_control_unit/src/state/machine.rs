//! Controller state transitions.
//!
//! ```text
//!             beginMotorIdentification            IdentificationComplete
//!   Idle ──────────────────────────► MotorIdentification ───────────────► Idle
//!   Idle ── beginHardwareTest ─────► HardwareTesting ── passed ─────────► Idle
//!                                                   └── failed ─────────► Fault
//!   Idle ── non-zero setpoint ─────► Spinup ── succeeded ───────────────► Running
//!                                           └── aborted ────────────────► Idle
//!   Spinup/Running ── setpoint expired ─────────────────────────────────► Idle
//!   any ── runtime fault ───────────────────────────────────────────────► Fault
//!   any ── stop / zero setpoint ────────────────────────────────────────► Idle
//! ```
//!
//! Only one of MotorIdentification, HardwareTesting, Spinup and Running can
//! be active; starting any of them requires Idle. Stop is never rejected.

use foc_common::state::State;

/// Result of a transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition taken. New state.
    Ok(State),
    /// Transition rejected. Reason.
    Rejected(&'static str),
}

impl TransitionResult {
    /// True if the transition was taken.
    #[inline]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Event that can trigger a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Facade requested motor identification.
    BeginMotorIdentification,
    /// Facade requested a hardware test.
    BeginHardwareTest,
    /// A non-zero setpoint was accepted in Idle.
    StartMotor,
    /// Identification task reported its result.
    IdentificationComplete,
    /// Hardware test finished without findings.
    HardwareTestPassed,
    /// Hardware test found a problem.
    HardwareTestFailed,
    /// Observer took over from the open-loop spin-up.
    SpinupSucceeded,
    /// Spin-up gave up without a hardware problem.
    SpinupAborted,
    /// Active setpoint reached its time-to-live.
    SetpointExpired,
    /// Zero setpoint or `stop()`.
    Stop,
    /// Overcurrent, stall, divergence or a failed task.
    RuntimeFault,
}

/// Holder of the authoritative controller state.
#[derive(Debug, Clone)]
pub struct ControllerStateMachine {
    state: State,
}

impl Default for ControllerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerStateMachine {
    /// Create a state machine in Idle.
    pub const fn new() -> Self {
        Self { state: State::Idle }
    }

    /// Current state.
    #[inline]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Attempt a transition given an event.
    pub fn handle_event(&mut self, event: ControllerEvent) -> TransitionResult {
        use ControllerEvent::*;
        use State::*;

        let next = match (self.state, event) {
            // Universal stop, also clears Fault.
            (_, Stop) => Idle,

            // Any fault latches, whatever was running.
            (_, RuntimeFault) => Fault,

            // Idle → exclusive activities
            (Idle, BeginMotorIdentification) => MotorIdentification,
            (Idle, BeginHardwareTest) => HardwareTesting,
            (Idle, StartMotor) => Spinup,

            (MotorIdentification, IdentificationComplete) => Idle,

            (HardwareTesting, HardwareTestPassed) => Idle,
            (HardwareTesting, HardwareTestFailed) => Fault,

            (Spinup, SpinupSucceeded) => Running,
            (Spinup, SpinupAborted) => Idle,

            // TTL safety stop.
            (Spinup | Running, SetpointExpired) => Idle,

            _ => {
                return TransitionResult::Rejected(invalid_transition_reason(self.state, event));
            }
        };

        self.state = next;
        TransitionResult::Ok(next)
    }

    /// True while identification, hardware test, spin-up or running owns
    /// the motor.
    #[inline]
    pub const fn is_busy(&self) -> bool {
        matches!(
            self.state,
            State::MotorIdentification | State::HardwareTesting | State::Spinup | State::Running
        )
    }

    /// True if a fault is latched.
    #[inline]
    pub const fn is_faulted(&self) -> bool {
        matches!(self.state, State::Fault)
    }
}

fn invalid_transition_reason(state: State, event: ControllerEvent) -> &'static str {
    use ControllerEvent::*;
    use State::*;
    match (state, event) {
        (Fault, _) => "Fault: only stop clears the fault",
        (MotorIdentification, _) => "MotorID: busy until identification completes",
        (HardwareTesting, _) => "HWTest: busy until the test completes",
        (Spinup, _) => "Spinup: busy, stop the motor first",
        (Running, _) => "Running: busy, stop the motor first",
        (Idle, SetpointExpired) => "Idle: no active setpoint",
        (Idle, _) => "Idle: no activity to complete",
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
