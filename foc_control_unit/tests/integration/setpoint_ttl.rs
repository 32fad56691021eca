//! Integration test: setpoint time-to-live.
//!
//! A non-zero setpoint expires `ttl` seconds after the tick that accepted it
//! unless renewed. Expiry stops the motor and counts an error.

use foc_common::fault::StopReason;
use foc_common::state::{ControlMode, State};
use foc_control_unit::driver::Actuation;

use super::common::{DT, Rig};

#[test]
fn unrenewed_setpoint_expires_in_running() {
    let mut rig = Rig::new();
    rig.handle.set_setpoint(ControlMode::Current, 1.0, 0.5).unwrap();

    rig.run_for(0.45);
    assert_eq!(rig.state(), State::Running);
    assert_eq!(rig.handle.error_count(), 0);

    let stopped = rig.run_until(0.1, |r| r.state() != State::Running);
    assert!(stopped);
    assert_eq!(rig.state(), State::Idle);
    let t = rig.controller.time();
    assert!(t >= 0.5 && t <= 0.5 + 3.0 * DT, "expired at {t}");

    assert_eq!(rig.handle.stop_reason(), StopReason::SetpointExpired);
    assert_eq!(rig.handle.error_count(), 1);
    assert_eq!(rig.controller.last_actuation(), Actuation::Disabled);
}

#[test]
fn renewed_setpoint_keeps_running() {
    let mut rig = Rig::new();
    rig.hold_setpoint(ControlMode::Current, 1.0, 0.5, 1.0);
    assert_eq!(rig.state(), State::Running);
    assert_eq!(rig.handle.error_count(), 0);
    assert_eq!(rig.handle.stop_reason(), StopReason::None);
}

#[test]
fn short_ttl_expires_during_spinup() {
    let mut rig = Rig::new();
    rig.handle.set_setpoint(ControlMode::Current, 1.0, 0.05).unwrap();
    rig.run_for(0.02);
    assert_eq!(rig.state(), State::Spinup);

    rig.run_for(0.05);
    assert_eq!(rig.state(), State::Idle);
    assert_eq!(rig.handle.stop_reason(), StopReason::SetpointExpired);
    assert_eq!(rig.handle.error_count(), 1);
}

#[test]
fn renewal_restarts_the_countdown() {
    let mut rig = Rig::new();
    rig.handle.set_setpoint(ControlMode::Current, 1.0, 0.3).unwrap();
    rig.run_for(0.25);
    rig.handle.set_setpoint(ControlMode::Current, 1.0, 0.3).unwrap();

    // The first command alone would have expired at 0.3 s.
    rig.run_for(0.2);
    assert_eq!(rig.state(), State::Running);

    let stopped = rig.run_until(0.2, |r| r.state() == State::Idle);
    assert!(stopped);
    let t = rig.controller.time();
    assert!(t >= 0.55 && t <= 0.55 + 3.0 * DT, "expired at {t}");
}

#[test]
fn expiry_after_stop_is_not_counted() {
    let mut rig = Rig::new();
    rig.handle.set_setpoint(ControlMode::Current, 1.0, 0.2).unwrap();
    rig.run_for(0.1);
    rig.handle.stop();
    rig.run_for(0.3);
    assert_eq!(rig.state(), State::Idle);
    assert_eq!(rig.handle.stop_reason(), StopReason::Commanded);
    assert_eq!(rig.handle.error_count(), 0);
}

#[test]
fn one_second_ttl_without_renewal_idles_the_bridge() {
    let mut rig = Rig::new();
    rig.handle.set_setpoint(ControlMode::Current, 5.0, 1.0).unwrap();

    rig.run_for(0.1);
    assert_eq!(rig.state(), State::Spinup);
    rig.run_for(0.5);
    assert_eq!(rig.state(), State::Running);

    rig.run_for(0.41);
    assert_eq!(rig.state(), State::Idle);
    assert_eq!(rig.handle.stop_reason(), StopReason::SetpointExpired);
    assert_eq!(rig.handle.error_count(), 1);
    assert!(rig.handle.faults().is_empty());
    assert_eq!(rig.controller.last_actuation(), Actuation::Disabled);
}
