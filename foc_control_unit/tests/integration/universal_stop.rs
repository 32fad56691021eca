//! Integration test: stop from every state.
//!
//! A stop (or a zero setpoint) disables the bridge and returns the
//! controller to Idle from any state, clearing latched faults.

use foc_common::fault::{FaultFlags, StopReason};
use foc_common::motor_id::Mode;
use foc_common::state::{ControlMode, State};
use foc_control_unit::driver::Actuation;

use super::common::Rig;

fn assert_stopped(rig: &Rig) {
    assert_eq!(rig.state(), State::Idle);
    assert_eq!(rig.handle.state(), State::Idle);
    assert_eq!(rig.handle.stop_reason(), StopReason::Commanded);
    assert_eq!(rig.controller.last_actuation(), Actuation::Disabled);
    assert!(rig.controller.power_stage().actuation().is_disabled());
}

#[test]
fn stop_during_spinup() {
    let mut rig = Rig::new();
    rig.handle.set_setpoint(ControlMode::Current, 1.0, 1.0).unwrap();
    rig.run_for(0.05);
    assert_eq!(rig.state(), State::Spinup);

    rig.handle.stop();
    rig.tick();
    assert_stopped(&rig);
}

#[test]
fn stop_during_running() {
    let mut rig = Rig::new();
    rig.spin_up(ControlMode::Current, 1.0);

    rig.handle.stop();
    rig.tick();
    assert_stopped(&rig);
    assert_eq!(rig.handle.telemetry().setpoint, None);
    assert_eq!(rig.handle.error_count(), 0);
}

#[test]
fn zero_setpoint_stops_in_any_mode() {
    let mut rig = Rig::new();
    rig.spin_up(ControlMode::Current, 1.0);

    rig.handle
        .set_setpoint(ControlMode::MechanicalRpm, 0.0, 0.0)
        .unwrap();
    rig.tick();
    assert_stopped(&rig);
}

#[test]
fn stop_during_identification() {
    let mut rig = Rig::new();
    rig.handle.begin_motor_identification(Mode::Static).unwrap();
    rig.run_for(0.01);
    assert_eq!(rig.state(), State::MotorIdentification);

    let before = rig.handle.motor_parameters();
    rig.handle.stop();
    rig.tick();
    assert_stopped(&rig);
    assert_eq!(rig.handle.motor_parameters(), before);
}

#[test]
fn stop_during_hardware_test() {
    let mut rig = Rig::new();
    rig.handle.begin_hardware_test().unwrap();
    rig.run_for(0.06);
    assert_eq!(rig.state(), State::HardwareTesting);

    rig.handle.stop();
    rig.tick();
    assert_stopped(&rig);
}

#[test]
fn stop_ends_a_beep() {
    let mut rig = Rig::new();
    rig.handle.beep(1000.0, 1.0).unwrap();
    rig.run_for(0.01);
    assert!(!rig.controller.last_actuation().is_disabled());

    rig.handle.stop();
    rig.tick();
    assert_stopped(&rig);
}

#[test]
fn zero_setpoint_clears_fault() {
    let mut rig = Rig::new();
    rig.controller.power_stage_mut().set_disconnected(true);
    rig.handle.begin_hardware_test().unwrap();
    rig.run_for(0.1);
    assert_eq!(rig.state(), State::Fault);
    assert!(rig.handle.faults().contains(FaultFlags::HARDWARE_TEST_FAILED));

    rig.handle.set_setpoint(ControlMode::Current, 0.0, 0.0).unwrap();
    rig.tick();
    assert_stopped(&rig);
    assert!(rig.handle.faults().is_empty());
    assert!(rig.controller.faults().is_empty());

    // The controller accepts work again.
    rig.controller.power_stage_mut().set_disconnected(false);
    rig.spin_up(ControlMode::Current, 1.0);
}

#[test]
fn stop_in_idle_is_harmless() {
    let mut rig = Rig::new();
    rig.handle.stop();
    rig.handle.stop();
    rig.ticks(3);
    assert_stopped(&rig);
    assert_eq!(rig.handle.error_count(), 0);
}
