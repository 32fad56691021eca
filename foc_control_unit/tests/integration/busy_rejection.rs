//! Integration test: command rejection.
//!
//! Activities own the motor exclusively. Commands that would interfere are
//! refused at the facade with a reason, and malformed arguments are refused
//! in every state.

use foc_common::fault::FaultFlags;
use foc_common::motor_id::Mode;
use foc_common::state::{ControlMode, State};
use foc_control_unit::command::CommandError;

use super::common::Rig;

#[test]
fn identification_owns_the_motor() {
    let mut rig = Rig::new();
    rig.handle.begin_motor_identification(Mode::Static).unwrap();
    rig.tick();
    assert_eq!(rig.handle.state(), State::MotorIdentification);

    let busy = Err(CommandError::Busy(State::MotorIdentification));
    assert_eq!(rig.handle.set_setpoint(ControlMode::Current, 1.0, 1.0), busy);
    assert_eq!(rig.handle.begin_hardware_test(), busy);
    assert_eq!(rig.handle.begin_motor_identification(Mode::Static), busy);
    assert_eq!(rig.handle.beep(1000.0, 0.1), busy);

    rig.tick();
    assert_eq!(rig.state(), State::MotorIdentification);
}

#[test]
fn hardware_test_owns_the_motor() {
    let mut rig = Rig::new();
    rig.handle.begin_hardware_test().unwrap();
    rig.tick();
    assert_eq!(rig.handle.state(), State::HardwareTesting);

    let busy = Err(CommandError::Busy(State::HardwareTesting));
    assert_eq!(rig.handle.set_setpoint(ControlMode::Current, 1.0, 1.0), busy);
    assert_eq!(
        rig.handle.begin_motor_identification(Mode::RotationWithoutMechanicalLoad),
        busy
    );
    assert_eq!(rig.handle.begin_hardware_test(), busy);
}

#[test]
fn fault_rejects_everything_but_stop() {
    let mut rig = Rig::new();
    rig.controller.power_stage_mut().set_disconnected(true);
    rig.handle.begin_hardware_test().unwrap();
    rig.run_for(0.1);
    assert_eq!(rig.handle.state(), State::Fault);

    let busy = Err(CommandError::Busy(State::Fault));
    assert_eq!(rig.handle.set_setpoint(ControlMode::Current, 1.0, 1.0), busy);
    assert_eq!(rig.handle.begin_hardware_test(), busy);
    assert_eq!(rig.handle.begin_motor_identification(Mode::Static), busy);
    assert_eq!(rig.handle.beep(440.0, 0.1), busy);

    rig.run_for(0.01);
    assert_eq!(rig.state(), State::Fault);
    assert!(rig.handle.faults().contains(FaultFlags::HARDWARE_TEST_FAILED));
}

#[test]
fn running_rejects_activities_and_reversal() {
    let mut rig = Rig::new();
    rig.spin_up(ControlMode::Current, 1.0);

    let busy = Err(CommandError::Busy(State::Running));
    assert_eq!(rig.handle.begin_hardware_test(), busy);
    assert_eq!(rig.handle.begin_motor_identification(Mode::Static), busy);
    assert_eq!(rig.handle.beep(1000.0, 0.1), busy);
    assert_eq!(
        rig.handle.set_setpoint(ControlMode::Current, -1.0, 1.0),
        Err(CommandError::DirectionChange)
    );

    // Same direction is an update.
    assert_eq!(rig.handle.set_setpoint(ControlMode::Current, 1.5, 1.0), Ok(()));
    rig.tick();
    assert_eq!(rig.handle.telemetry().setpoint, Some((ControlMode::Current, 1.5)));
}

#[test]
fn spinup_rejects_reversal() {
    let mut rig = Rig::new();
    rig.handle.set_setpoint(ControlMode::Current, -1.0, 1.0).unwrap();
    rig.run_for(0.01);
    assert_eq!(rig.handle.state(), State::Spinup);
    assert_eq!(
        rig.handle.set_setpoint(ControlMode::MechanicalRpm, 500.0, 1.0),
        Err(CommandError::DirectionChange)
    );
    assert_eq!(
        rig.handle.begin_hardware_test(),
        Err(CommandError::Busy(State::Spinup))
    );
}

#[test]
fn malformed_setpoints_are_invalid_in_any_state() {
    let rig = Rig::new();
    let h = &rig.handle;
    let invalid = |r: Result<(), CommandError>| matches!(r, Err(CommandError::InvalidArgument(_)));

    assert!(invalid(h.set_setpoint(ControlMode::Current, f64::NAN, 1.0)));
    assert!(invalid(h.set_setpoint(ControlMode::Current, f64::INFINITY, 1.0)));
    assert!(invalid(h.set_setpoint(ControlMode::Current, 1.0, -1.0)));
    assert!(invalid(h.set_setpoint(ControlMode::Current, 1.0, f64::NAN)));
    assert!(invalid(h.set_setpoint(ControlMode::RatiometricVoltage, 1.5, 1.0)));
    assert!(invalid(h.set_setpoint(ControlMode::RatiometricCurrent, -1.01, 1.0)));
    assert_eq!(h.set_setpoint(ControlMode::RatiometricCurrent, 1.0, 1.0), Ok(()));
}

#[test]
fn beep_arguments_are_range_checked() {
    let rig = Rig::new();
    let h = &rig.handle;
    let invalid = |r: Result<(), CommandError>| matches!(r, Err(CommandError::InvalidArgument(_)));

    assert!(invalid(h.beep(0.0, 0.1)));
    assert!(invalid(h.beep(-100.0, 0.1)));
    assert!(invalid(h.beep(30_000.0, 0.1)));
    assert!(invalid(h.beep(f64::NAN, 0.1)));
    assert!(invalid(h.beep(1000.0, 0.0)));
    assert!(invalid(h.beep(1000.0, 11.0)));
    assert_eq!(h.beep(1000.0, 0.1), Ok(()));
}

#[test]
fn rejected_commands_do_not_count_errors() {
    let mut rig = Rig::new();
    rig.spin_up(ControlMode::Current, 1.0);
    let _ = rig.handle.set_setpoint(ControlMode::Current, -1.0, 1.0);
    let _ = rig.handle.begin_hardware_test();
    let _ = rig.handle.beep(f64::NAN, 1.0);
    rig.tick();
    assert_eq!(rig.handle.error_count(), 0);
}
