//! Public controller interface.
//!
//! [`init`] validates the parameters, runs the blocking power stage
//! calibration and splits the controller into two halves:
//!
//! - [`Controller`] owns the power stage and is ticked by the real-time
//!   context at a fixed rate. It never blocks on the facade.
//! - [`ControllerHandle`] is `Clone + Send + Sync` and implements every
//!   facade operation from any other thread. Commands are queued and take
//!   effect at the start of the next tick.
//!
//! ## Tick
//!
//! 1. Reject a non-finite or non-positive `dt`.
//! 2. Advance the clock, read one sample.
//! 3. Drain queued requests in issue order (next tick if a facade call
//!    holds the queue).
//! 4. Undervoltage supervision while the motor is driven.
//! 5. Step the active task or the running loop.
//! 6. Setpoint TTL check in Spinup/Running.
//! 7. Apply the actuation.
//! 8. Hand identified constants and test reports to the facade slots.
//! 9. Filter and publish telemetry.
//!
//! Every transition into Idle or Fault disables the power stage before the
//! state changes. Staged parameters are committed whenever a transition is
//! taken, and only then. The tick takes every shared lock with `try_lock`;
//! a contended commit waits for the next transition and a contended
//! handoff is retried on the next tick.

use std::io::{self, Write};
use std::sync::Arc;

use foc_common::config::{ConfigError, Validate};
use foc_common::debug::{DebugKeyValues, debug_key_values};
use foc_common::fault::{FaultFlags, StopReason};
use foc_common::hw_test::HardwareTestReport;
use foc_common::motor_id::Mode;
use foc_common::params::{MotorParameters, Parameters};
use foc_common::state::{ControlMode, State};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::CommandError;
use crate::command::arbitration::{Arbitration, SetpointArbiter, SetpointRequest};
use crate::command::queue::Request;
use crate::control::filters::{LowPassState, lowpass_apply};
use crate::driver::{Actuation, PowerStage, PowerStageError, Sample};
use crate::shared::{Shared, Telemetry};
use crate::state::machine::{ControllerEvent, ControllerStateMachine, TransitionResult};
use crate::task::beep::BeepTask;
use crate::task::hw_test::HardwareTestTask;
use crate::task::motor_id::{IdentificationTask, IdentifiedMotor};
use crate::task::running::{Estimate, RunningLoop, RunningStatus};
use crate::task::spinup::{Handover, SpinupTask};
use crate::task::{ControlTask, TaskFailure, TaskStatus};

/// Highest accepted beep frequency [Hz].
pub const MAX_BEEP_FREQUENCY: f64 = 20_000.0;
/// Longest accepted beep [s].
pub const MAX_BEEP_DURATION: f64 = 10.0;

/// Failure of [`init`].
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid parameters: {0}")]
    Parameters(#[from] ConfigError),

    #[error(transparent)]
    Calibration(#[from] PowerStageError),
}

/// Validate parameters, calibrate the power stage and build the controller.
///
/// Blocks for as long as the power stage calibration takes. Must complete
/// before the real-time context starts ticking.
pub fn init<P: PowerStage>(
    parameters: Parameters,
    mut power_stage: P,
) -> Result<(Controller<P>, ControllerHandle), InitError> {
    parameters.validate()?;
    info!("calibrating power stage");
    power_stage.calibrate()?;
    power_stage.apply(&Actuation::Disabled);

    let shared = Arc::new(Shared::new(parameters));
    let controller = Controller {
        shared: Arc::clone(&shared),
        power_stage,
        machine: ControllerStateMachine::new(),
        arbiter: SetpointArbiter::new(),
        parameters,
        activity: Activity::Idle,
        now_ns: 0,
        faults: FaultFlags::empty(),
        stop_reason: StopReason::None,
        filters: TelemetryFilters::default(),
        last_sample: Sample::default(),
        last_actuation: Actuation::Disabled,
        handoff: Handoff::default(),
        tick_count: 0,
    };
    info!(
        pole_pairs = parameters.motor.pole_pairs(),
        max_current = parameters.motor.max_current,
        "controller initialized"
    );
    Ok((controller, ControllerHandle { shared }))
}

// ─── Real-time side ─────────────────────────────────────────────────

/// What currently owns the motor.
#[derive(Debug)]
enum Activity {
    Idle,
    Beep(BeepTask),
    Identification(IdentificationTask),
    HardwareTest(HardwareTestTask),
    Spinup(SpinupTask),
    Running(RunningLoop),
}

/// Completion reported by the active task.
enum Outcome {
    BeepDone,
    Identified(IdentifiedMotor),
    HardwareTestDone(HardwareTestReport),
    SpinupDone(Handover),
    Failed(TaskFailure, ControllerEvent),
    Clamped,
    RuntimeFault(FaultFlags, &'static str),
}

/// Results produced by the tick and not yet copied to the facade slots.
#[derive(Debug, Clone, Copy, Default)]
struct Handoff {
    motor: Option<MotorParameters>,
    report: Option<HardwareTestReport>,
}

#[derive(Debug, Clone, Copy, Default)]
struct TelemetryFilters {
    current: LowPassState,
    demand: LowPassState,
    rpm: LowPassState,
}

/// Real-time half of the controller.
#[derive(Debug)]
pub struct Controller<P: PowerStage> {
    shared: Arc<Shared>,
    power_stage: P,
    machine: ControllerStateMachine,
    arbiter: SetpointArbiter,
    /// Committed parameters, the RT copy.
    parameters: Parameters,
    activity: Activity,
    now_ns: u64,
    faults: FaultFlags,
    stop_reason: StopReason,
    filters: TelemetryFilters,
    last_sample: Sample,
    last_actuation: Actuation,
    handoff: Handoff,
    tick_count: u64,
}

impl<P: PowerStage> Controller<P> {
    /// Run one control tick, `dt` seconds after the previous one.
    pub fn tick(&mut self, dt: f64) {
        if !(dt.is_finite() && dt > 0.0) {
            self.shared.count_error();
            return;
        }
        self.now_ns = self.now_ns.saturating_add((dt * 1e9).round() as u64);
        self.tick_count += 1;
        let sample = self.power_stage.sample();
        self.last_sample = sample;

        self.drain_requests();

        if matches!(
            self.machine.state(),
            State::MotorIdentification | State::Spinup | State::Running
        ) && sample.inverter_voltage < self.parameters.controller.min_inverter_voltage
        {
            self.raise_fault(FaultFlags::UNDERVOLTAGE, "inverter undervoltage");
        }

        let (mut actuation, outcome) = self.step_activity(dt, &sample);
        if let Some(outcome) = outcome {
            if !self.complete(outcome) {
                actuation = Actuation::Disabled;
            }
        }

        if self.machine.state().is_motor_active() {
            if let Some(expired) = self.arbiter.expired(self.now_ns) {
                debug!(
                    issued_at_ns = expired.issued_at_ns,
                    expires_at_ns = expired.expires_at_ns,
                    "setpoint expired"
                );
                self.shared.count_error();
                self.enter_idle(ControllerEvent::SetpointExpired, StopReason::SetpointExpired);
                actuation = Actuation::Disabled;
            }
        }

        self.power_stage.apply(&actuation);
        self.last_actuation = actuation;
        self.flush_handoff();
        self.publish(dt, &sample, &actuation);
    }

    fn drain_requests(&mut self) {
        let Some(mut queue) = self.shared.requests.try_lock() else {
            return;
        };
        let mut pending = core::mem::take(&mut *queue);
        drop(queue);
        while let Some(request) = pending.pop() {
            self.handle_request(request);
        }
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Setpoint(req) if req.is_stop() => {
                self.faults = FaultFlags::empty();
                self.enter_idle(ControllerEvent::Stop, StopReason::Commanded);
            }
            Request::Setpoint(req) => {
                match self.arbiter.arbitrate(&req, self.machine.state(), self.now_ns) {
                    Arbitration::Start(cmd) => {
                        if self.transition(ControllerEvent::StartMotor) {
                            self.activity = Activity::Spinup(SpinupTask::new(
                                &self.parameters,
                                cmd.direction(),
                            ));
                        } else {
                            self.arbiter.clear();
                        }
                    }
                    Arbitration::Update(_) => {}
                    Arbitration::Rejected(reason) => {
                        debug!(mode = ?req.mode, value = req.value, reason, "setpoint rejected");
                    }
                }
            }
            Request::BeginMotorIdentification(mode) => {
                if self.transition(ControllerEvent::BeginMotorIdentification) {
                    info!(?mode, "motor identification started");
                    self.activity =
                        Activity::Identification(IdentificationTask::new(mode, &self.parameters));
                }
            }
            Request::BeginHardwareTest => {
                if self.transition(ControllerEvent::BeginHardwareTest) {
                    let calibrated = match self.power_stage.calibrate() {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(error = %e, "recalibration failed");
                            false
                        }
                    };
                    self.activity = Activity::HardwareTest(HardwareTestTask::new(
                        calibrated,
                        &self.parameters.controller,
                    ));
                }
            }
            Request::Beep {
                frequency,
                duration,
            } => {
                if self.machine.state() == State::Idle && matches!(self.activity, Activity::Idle) {
                    self.activity = Activity::Beep(BeepTask::new(
                        frequency,
                        duration,
                        self.parameters.controller.beep_voltage,
                    ));
                } else {
                    debug!("beep dropped, controller busy");
                }
            }
        }
    }

    fn step_activity(&mut self, dt: f64, sample: &Sample) -> (Actuation, Option<Outcome>) {
        match &mut self.activity {
            Activity::Idle => (Actuation::Disabled, None),
            Activity::Beep(task) => {
                let step = task.step(dt, sample);
                let outcome = match step.status {
                    TaskStatus::InProgress => None,
                    _ => Some(Outcome::BeepDone),
                };
                (step.actuation, outcome)
            }
            Activity::Identification(task) => {
                let step = task.step(dt, sample);
                let outcome = match step.status {
                    TaskStatus::InProgress => None,
                    TaskStatus::Done(motor) => Some(Outcome::Identified(motor)),
                    TaskStatus::Failed(f) => {
                        Some(Outcome::Failed(f, ControllerEvent::RuntimeFault))
                    }
                };
                (step.actuation, outcome)
            }
            Activity::HardwareTest(task) => {
                let step = task.step(dt, sample);
                let outcome = match step.status {
                    TaskStatus::InProgress => None,
                    TaskStatus::Done(report) => Some(Outcome::HardwareTestDone(report)),
                    TaskStatus::Failed(f) => {
                        Some(Outcome::Failed(f, ControllerEvent::HardwareTestFailed))
                    }
                };
                (step.actuation, outcome)
            }
            Activity::Spinup(task) => {
                let step = task.step(dt, sample);
                let outcome = match step.status {
                    TaskStatus::InProgress => None,
                    TaskStatus::Done(handover) => Some(Outcome::SpinupDone(handover)),
                    TaskStatus::Failed(f) if f.is_benign() => {
                        Some(Outcome::Failed(f, ControllerEvent::SpinupAborted))
                    }
                    TaskStatus::Failed(f) => {
                        Some(Outcome::Failed(f, ControllerEvent::RuntimeFault))
                    }
                };
                (step.actuation, outcome)
            }
            Activity::Running(running) => {
                let Some(command) = self.arbiter.active() else {
                    return (
                        Actuation::Disabled,
                        Some(Outcome::RuntimeFault(FaultFlags::empty(), "no active command")),
                    );
                };
                let step = running.step(dt, sample, command);
                let outcome = match step.status {
                    RunningStatus::Ok => None,
                    RunningStatus::Clamped => Some(Outcome::Clamped),
                    RunningStatus::Fault(flags, reason) => {
                        Some(Outcome::RuntimeFault(flags, reason))
                    }
                };
                (step.actuation, outcome)
            }
        }
    }

    /// Act on a task outcome. Returns false if the tick's actuation must be
    /// replaced by a disabled bridge.
    fn complete(&mut self, outcome: Outcome) -> bool {
        match outcome {
            Outcome::BeepDone => {
                self.activity = Activity::Idle;
                false
            }
            Outcome::Identified(identified) => {
                self.enter_idle(
                    ControllerEvent::IdentificationComplete,
                    StopReason::IdentificationComplete,
                );
                identified.apply_to(&mut self.parameters.motor);
                self.handoff.motor = Some(self.parameters.motor);
                info!(
                    resistance = identified.resistance,
                    inductance = identified.inductance_d,
                    field_flux = identified.field_flux,
                    "motor identified"
                );
                false
            }
            Outcome::HardwareTestDone(report) => {
                self.handoff.report = Some(report);
                if report.passed() {
                    info!(inverter_voltage = report.inverter_voltage, "hardware test passed");
                    self.enter_idle(
                        ControllerEvent::HardwareTestPassed,
                        StopReason::HardwareTestPassed,
                    );
                } else {
                    for finding in report.describe() {
                        warn!(finding, "hardware test finding");
                    }
                    self.latch(
                        FaultFlags::HARDWARE_TEST_FAILED,
                        ControllerEvent::HardwareTestFailed,
                        "hardware test failed",
                    );
                }
                false
            }
            Outcome::SpinupDone(handover) => {
                if !self.transition(ControllerEvent::SpinupSucceeded) {
                    return false;
                }
                match RunningLoop::new(&self.parameters, &handover) {
                    Ok(running) => {
                        info!(
                            velocity = handover.velocity,
                            angle = handover.angle,
                            "observer took over"
                        );
                        self.activity = Activity::Running(running);
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "observer construction failed");
                        self.raise_fault(FaultFlags::OBSERVER_DIVERGED, "observer construction failed");
                        false
                    }
                }
            }
            Outcome::Failed(failure, ControllerEvent::SpinupAborted) => {
                info!(reason = failure.reason, "spin-up aborted");
                self.shared.count_error();
                self.enter_idle(ControllerEvent::SpinupAborted, StopReason::SpinupFailed);
                false
            }
            Outcome::Failed(failure, ControllerEvent::HardwareTestFailed) => {
                self.latch(
                    failure.fault | FaultFlags::HARDWARE_TEST_FAILED,
                    ControllerEvent::HardwareTestFailed,
                    failure.reason,
                );
                false
            }
            Outcome::Failed(failure, _) => {
                self.raise_fault(failure.fault, failure.reason);
                false
            }
            Outcome::Clamped => {
                self.shared.count_error();
                true
            }
            Outcome::RuntimeFault(flags, reason) => {
                self.raise_fault(flags, reason);
                false
            }
        }
    }

    /// Take a transition, commit staged parameters and publish the state.
    fn transition(&mut self, event: ControllerEvent) -> bool {
        let from = self.machine.state();
        match self.machine.handle_event(event) {
            TransitionResult::Ok(to) => {
                match self.shared.parameters.try_lock() {
                    Some(mut slots) => {
                        // Identified constants land before the staged set is promoted.
                        if let Some(motor) = self.handoff.motor.take() {
                            slots.replace_motor(motor);
                        }
                        if let Some(committed) = slots.commit() {
                            self.parameters = committed;
                            debug!("staged parameters committed");
                        }
                    }
                    None => debug!("parameter slots busy, commit deferred"),
                }
                self.shared.store_state(to);
                info!(from = from.as_str(), to = to.as_str(), ?event, "state transition");
                true
            }
            TransitionResult::Rejected(reason) => {
                debug!(?event, reason, "transition rejected");
                false
            }
        }
    }

    /// Copy pending results into the facade slots without waiting.
    fn flush_handoff(&mut self) {
        if let Some(motor) = self.handoff.motor {
            if let Some(mut slots) = self.shared.parameters.try_lock() {
                slots.replace_motor(motor);
                self.handoff.motor = None;
            }
        }
        if let Some(report) = self.handoff.report {
            if let Some(mut slot) = self.shared.hw_report.try_lock() {
                *slot = Some(report);
                self.handoff.report = None;
            }
        }
    }

    fn disable_output(&mut self) {
        self.power_stage.apply(&Actuation::Disabled);
        self.last_actuation = Actuation::Disabled;
        self.activity = Activity::Idle;
        self.arbiter.clear();
    }

    /// Benign return to Idle.
    fn enter_idle(&mut self, event: ControllerEvent, reason: StopReason) {
        self.disable_output();
        if self.transition(event) {
            self.stop_reason = reason;
        }
    }

    /// Latch a runtime fault from any state.
    fn raise_fault(&mut self, flags: FaultFlags, reason: &'static str) {
        self.latch(flags, ControllerEvent::RuntimeFault, reason);
    }

    fn latch(&mut self, flags: FaultFlags, event: ControllerEvent, reason: &'static str) {
        self.disable_output();
        self.faults |= flags;
        self.shared.count_error();
        warn!(reason, faults = ?self.faults, "fault latched");
        self.transition(event);
    }

    fn estimate(&self) -> Estimate {
        match &self.activity {
            Activity::Running(running) => running.estimate(),
            Activity::Spinup(task) => {
                let (angle, velocity) = task.forced_state();
                let (idq, udq) = task.forced_dq();
                Estimate {
                    idq: [idq.x, idq.y],
                    udq: [udq.x, udq.y],
                    velocity,
                    angle,
                }
            }
            _ => Estimate::default(),
        }
    }

    fn publish(&mut self, dt: f64, sample: &Sample, actuation: &Actuation) {
        let cutoff = self.parameters.controller.telemetry_cutoff;
        let estimate = self.estimate();
        let [ia, ib] = sample.phase_currents;
        let u_max = sample.max_phase_voltage();
        let demand = if u_max > 0.0 {
            actuation.voltage_magnitude() / u_max * 100.0
        } else {
            0.0
        };
        let rpm = self.parameters.motor.electrical_to_rpm(estimate.velocity);

        let f = &mut self.filters;
        let current_filtered = lowpass_apply(&mut f.current, cutoff, ia.hypot(ib), dt);
        let demand_factor_filtered = lowpass_apply(&mut f.demand, cutoff, demand, dt);
        let mechanical_rpm_filtered = lowpass_apply(&mut f.rpm, cutoff, rpm, dt);

        let snapshot = Telemetry {
            state: self.machine.state(),
            stop_reason: self.stop_reason,
            faults: self.faults,
            time: self.time(),
            tick_count: self.tick_count,
            current_filtered,
            demand_factor_filtered,
            mechanical_rpm_filtered,
            idq: estimate.idq,
            udq: estimate.udq,
            electrical_velocity: estimate.velocity,
            electrical_angle: estimate.angle,
            inverter_voltage: sample.inverter_voltage,
            setpoint: self.arbiter.active().map(|c| (c.mode, c.value)),
        };
        if let Some(mut slot) = self.shared.telemetry.try_lock() {
            *slot = snapshot;
        }
    }

    /// Authoritative state.
    #[inline]
    pub fn state(&self) -> State {
        self.machine.state()
    }

    /// Controller clock [s].
    #[inline]
    pub fn time(&self) -> f64 {
        self.now_ns as f64 * 1e-9
    }

    /// Latched faults.
    #[inline]
    pub fn faults(&self) -> FaultFlags {
        self.faults
    }

    /// Actuation applied by the last tick.
    #[inline]
    pub fn last_actuation(&self) -> Actuation {
        self.last_actuation
    }

    /// Sample read by the last tick.
    #[inline]
    pub fn last_sample(&self) -> Sample {
        self.last_sample
    }

    /// Parameters in effect on the real-time side.
    #[inline]
    pub fn effective_parameters(&self) -> &Parameters {
        &self.parameters
    }

    #[inline]
    pub fn power_stage(&self) -> &P {
        &self.power_stage
    }

    #[inline]
    pub fn power_stage_mut(&mut self) -> &mut P {
        &mut self.power_stage
    }

    /// Another facade handle for this controller.
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

// ─── Facade ─────────────────────────────────────────────────────────

/// Thread-safe facade of one controller.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    shared: Arc<Shared>,
}

impl ControllerHandle {
    fn push(&self, request: Request) -> Result<(), CommandError> {
        self.shared.requests.lock().push(request)
    }

    fn require_idle(&self) -> Result<(), CommandError> {
        match self.state() {
            State::Idle => Ok(()),
            busy => Err(CommandError::Busy(busy)),
        }
    }

    // ── Parameters ──────────────────────────────────────────────

    /// Validate and stage a parameter set. It takes effect at the next
    /// state transition.
    pub fn set_parameters(&self, parameters: Parameters) -> Result<(), ConfigError> {
        parameters.validate()?;
        self.shared.parameters.lock().stage(parameters);
        debug!("parameters staged");
        Ok(())
    }

    /// Last staged-or-committed parameters.
    pub fn parameters(&self) -> Parameters {
        self.shared.parameters.lock().latest()
    }

    /// Parameters currently in effect.
    pub fn effective_parameters(&self) -> Parameters {
        *self.shared.parameters.lock().committed()
    }

    /// Motor subset of [`parameters`](Self::parameters).
    pub fn motor_parameters(&self) -> MotorParameters {
        self.parameters().motor
    }

    // ── Activities ──────────────────────────────────────────────

    pub fn begin_motor_identification(&self, mode: Mode) -> Result<(), CommandError> {
        self.require_idle()?;
        self.push(Request::BeginMotorIdentification(mode))
    }

    /// Start the hardware test. Recalibrates the power stage.
    pub fn begin_hardware_test(&self) -> Result<(), CommandError> {
        self.require_idle()?;
        self.push(Request::BeginHardwareTest)
    }

    /// Report of the last completed hardware test.
    pub fn hardware_test_report(&self) -> Option<HardwareTestReport> {
        *self.shared.hw_report.lock()
    }

    pub fn state(&self) -> State {
        self.shared.state()
    }

    /// Command the motor. A zero value stops and clears a latched fault in
    /// every state; a non-zero value expires `ttl` seconds after the tick
    /// that accepts it unless renewed.
    pub fn set_setpoint(&self, mode: ControlMode, value: f64, ttl: f64) -> Result<(), CommandError> {
        let request = SetpointRequest::new(mode, value, ttl);
        if request.is_stop() {
            self.stop();
            return Ok(());
        }
        request.validate().map_err(CommandError::InvalidArgument)?;

        let state = self.state();
        if !state.accepts_setpoint() {
            return Err(CommandError::Busy(state));
        }
        if state.is_motor_active() {
            let active = self.shared.telemetry.lock().setpoint;
            if let Some((_, current)) = active {
                if current.signum() != value.signum() {
                    return Err(CommandError::DirectionChange);
                }
            }
        }
        self.push(Request::Setpoint(request))
    }

    /// Same as a zero setpoint in mode 0.
    pub fn stop(&self) {
        self.shared.requests.lock().push_stop();
    }

    /// Play a tone. Only accepted in Idle.
    pub fn beep(&self, frequency: f64, duration: f64) -> Result<(), CommandError> {
        if !(frequency > 0.0 && frequency <= MAX_BEEP_FREQUENCY) {
            return Err(CommandError::InvalidArgument("beep frequency out of range"));
        }
        if !(duration > 0.0 && duration <= MAX_BEEP_DURATION) {
            return Err(CommandError::InvalidArgument("beep duration out of range"));
        }
        self.require_idle()?;
        self.push(Request::Beep {
            frequency,
            duration,
        })
    }

    // ── Telemetry ───────────────────────────────────────────────

    /// Last published snapshot.
    pub fn telemetry(&self) -> Telemetry {
        *self.shared.telemetry.lock()
    }

    /// Filtered phase current magnitude [A].
    pub fn instant_current_filtered(&self) -> f64 {
        self.telemetry().current_filtered
    }

    /// Filtered voltage demand [% of available].
    pub fn instant_demand_factor_filtered(&self) -> f64 {
        self.telemetry().demand_factor_filtered
    }

    /// Filtered mechanical speed [RPM].
    pub fn instant_mechanical_rpm(&self) -> f64 {
        self.telemetry().mechanical_rpm_filtered
    }

    /// Errors counted since init. Only ever grows.
    pub fn error_count(&self) -> u32 {
        self.shared.error_count()
    }

    pub fn stop_reason(&self) -> StopReason {
        self.telemetry().stop_reason
    }

    pub fn faults(&self) -> FaultFlags {
        self.telemetry().faults
    }

    /// `Id`, `Iq`, `Wel`, `Vdc`.
    pub fn debug_key_value_pairs(&self) -> DebugKeyValues {
        let t = self.telemetry();
        debug_key_values([t.idq[0], t.idq[1], t.electrical_velocity, t.inverter_voltage])
    }

    // ── Diagnostics ─────────────────────────────────────────────

    /// Human-readable status block.
    pub fn write_status_info<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let t = self.telemetry();
        let p = self.parameters();
        writeln!(out, "State:       {}", t.state)?;
        writeln!(out, "Stop reason: {:?}", t.stop_reason)?;
        writeln!(out, "Faults:      {:?}", t.faults)?;
        writeln!(out, "Errors:      {}", self.error_count())?;
        writeln!(out, "Time:        {:.4} s ({} ticks)", t.time, t.tick_count)?;
        match t.setpoint {
            Some((mode, value)) => writeln!(out, "Setpoint:    {mode:?} {value}")?,
            None => writeln!(out, "Setpoint:    none")?,
        }
        writeln!(
            out,
            "Current:     {:.3} A  Demand: {:.1} %  Speed: {:.1} RPM",
            t.current_filtered, t.demand_factor_filtered, t.mechanical_rpm_filtered
        )?;
        writeln!(
            out,
            "Idq:         [{:.3}, {:.3}] A  Udq: [{:.3}, {:.3}] V",
            t.idq[0], t.idq[1], t.udq[0], t.udq[1]
        )?;
        writeln!(
            out,
            "Electrical:  {:.1} rad/s  {:.3} rad  Vdc: {:.2} V",
            t.electrical_velocity, t.electrical_angle, t.inverter_voltage
        )?;
        let m = p.motor;
        writeln!(
            out,
            "Motor:       phi={:.6} Wb  Ld={:.3e} H  Lq={:.3e} H  R={:.4} Ohm  poles={}",
            m.field_flux, m.inductance_d, m.inductance_q, m.resistance, m.num_poles
        )?;
        if let Some(report) = self.hardware_test_report() {
            write!(out, "HW test:     ")?;
            if report.passed() {
                writeln!(out, "passed")?;
            } else {
                for name in report.describe() {
                    write!(out, "{name} ")?;
                }
                writeln!(out)?;
            }
        }
        Ok(())
    }

    /// Print [`write_status_info`](Self::write_status_info) to stdout.
    pub fn print_status_info(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.write_status_info(&mut lock)
    }

    /// One line of whitespace-separated values for a live plot:
    /// time, state, filtered current, demand, RPM, i_d, i_q, u_d, u_q, ω, θ.
    pub fn write_plot_line<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let t = self.telemetry();
        writeln!(
            out,
            "{:.5} {} {:.4} {:.2} {:.2} {:.4} {:.4} {:.4} {:.4} {:.2} {:.4}",
            t.time,
            t.state as u8,
            t.current_filtered,
            t.demand_factor_filtered,
            t.mechanical_rpm_filtered,
            t.idq[0],
            t.idq[1],
            t.udq[0],
            t.udq[1],
            t.electrical_velocity,
            t.electrical_angle,
        )
    }

    /// Print [`write_plot_line`](Self::write_plot_line) to stdout.
    pub fn plot_real_time_values(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.write_plot_line(&mut lock)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
