//! Tick-driven control tasks.
//!
//! Identification, hardware test, spin-up and beep are long-running
//! procedures advanced one control tick at a time by the controller. Each
//! implements [`ControlTask`]: given the elapsed time and the tick's sample,
//! decide the actuation and report whether the procedure is still running,
//! finished with a result, or failed.
//!
//! The closed-loop running law lives in [`running`]; it needs the active
//! command every tick and never completes on its own.

pub mod beep;
pub mod forced;
pub mod motor_id;
pub mod running;
pub mod spinup;

use foc_common::fault::FaultFlags;

use crate::driver::{Actuation, Sample};

/// Why a task gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskFailure {
    /// Human-readable cause.
    pub reason: &'static str,
    /// Fault to latch. Empty for a benign abort that returns to Idle.
    pub fault: FaultFlags,
}

impl TaskFailure {
    /// Abort without a hardware or model problem.
    pub const fn benign(reason: &'static str) -> Self {
        Self {
            reason,
            fault: FaultFlags::empty(),
        }
    }

    /// Abort that latches `fault`.
    pub const fn fault(reason: &'static str, fault: FaultFlags) -> Self {
        Self { reason, fault }
    }

    #[inline]
    pub const fn is_benign(&self) -> bool {
        self.fault.is_empty()
    }
}

/// Progress of a task after one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskStatus<R> {
    InProgress,
    Done(R),
    Failed(TaskFailure),
}

/// Output of one task tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskStep<R> {
    pub actuation: Actuation,
    pub status: TaskStatus<R>,
}

impl<R> TaskStep<R> {
    #[inline]
    pub const fn running(actuation: Actuation) -> Self {
        Self {
            actuation,
            status: TaskStatus::InProgress,
        }
    }

    #[inline]
    pub const fn done(actuation: Actuation, result: R) -> Self {
        Self {
            actuation,
            status: TaskStatus::Done(result),
        }
    }

    /// Failure always disables the bridge.
    #[inline]
    pub const fn failed(failure: TaskFailure) -> Self {
        Self {
            actuation: Actuation::Disabled,
            status: TaskStatus::Failed(failure),
        }
    }
}

/// A procedure advanced once per control tick.
pub trait ControlTask {
    /// Result reported on completion.
    type Output;

    /// Advance by `dt` seconds using this tick's measurements.
    fn step(&mut self, dt: f64, sample: &Sample) -> TaskStep<Self::Output>;
}

/// Phase current magnitude above the trip level.
#[inline]
pub(crate) fn overcurrent(sample: &Sample, trip_level: f64) -> bool {
    let [a, b] = sample.phase_currents;
    a.hypot(b) > trip_level
}
