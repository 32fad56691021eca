//! Handoff between the real-time tick and the facade.
//!
//! The tick is the single writer of state, telemetry and committed
//! parameters; the facade is the single writer of staged parameters and
//! pending requests. Every exchange is a copy under a short critical
//! section. The tick takes these locks with `try_lock` only and never
//! waits on the facade. Whatever it cannot copy this tick is retried on
//! the next one.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use foc_common::fault::{FaultFlags, StopReason};
use foc_common::hw_test::HardwareTestReport;
use foc_common::params::Parameters;
use foc_common::state::{ControlMode, State};
use parking_lot::Mutex;

use crate::command::queue::RequestQueue;
use crate::command::staging::ParameterSlots;

/// Consistent snapshot published once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Telemetry {
    pub state: State,
    pub stop_reason: StopReason,
    pub faults: FaultFlags,
    /// Controller clock [s].
    pub time: f64,
    pub tick_count: u64,
    /// Filtered magnitude of the phase current vector [A].
    pub current_filtered: f64,
    /// Filtered voltage demand [% of available].
    pub demand_factor_filtered: f64,
    /// Filtered mechanical speed [RPM].
    pub mechanical_rpm_filtered: f64,
    /// Rotor-frame current estimate [A].
    pub idq: [f64; 2],
    /// Rotor-frame voltage [V].
    pub udq: [f64; 2],
    /// Electrical angular velocity [rad/s].
    pub electrical_velocity: f64,
    /// Electrical angle [rad].
    pub electrical_angle: f64,
    /// Bus voltage [V].
    pub inverter_voltage: f64,
    /// Active setpoint.
    pub setpoint: Option<(ControlMode, f64)>,
}

/// State shared by one `Controller` and its handles.
#[derive(Debug)]
pub struct Shared {
    pub(crate) requests: Mutex<RequestQueue>,
    pub(crate) telemetry: Mutex<Telemetry>,
    pub(crate) parameters: Mutex<ParameterSlots>,
    pub(crate) hw_report: Mutex<Option<HardwareTestReport>>,
    state: AtomicU8,
    error_count: AtomicU32,
}

impl Shared {
    pub(crate) fn new(parameters: Parameters) -> Self {
        Self {
            requests: Mutex::new(RequestQueue::new()),
            telemetry: Mutex::new(Telemetry::default()),
            parameters: Mutex::new(ParameterSlots::new(parameters)),
            hw_report: Mutex::new(None),
            state: AtomicU8::new(State::Idle as u8),
            error_count: AtomicU32::new(0),
        }
    }

    /// Last state stored by the tick.
    #[inline]
    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(State::Fault)
    }

    #[inline]
    pub(crate) fn store_state(&self, state: State) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Saturating increment.
    #[inline]
    pub(crate) fn count_error(&self) {
        let _ = self
            .error_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some(c.saturating_add(1))
            });
    }
}
