//! Integration test: parameter staging.
//!
//! `set_parameters` only stages a validated set. The real-time side adopts
//! it at the next state transition, and identification results overwrite
//! the motor constants in both the committed and the staged set.

use foc_common::config::ConfigError;
use foc_common::motor_id::Mode;
use foc_common::params::Parameters;
use foc_common::state::{ControlMode, State};

use super::common::Rig;

fn altered(base: &Parameters) -> Parameters {
    let mut p = *base;
    p.motor.max_current = 8.0;
    p.controller.telemetry_cutoff = 20.0;
    p
}

#[test]
fn staged_parameters_wait_for_a_transition() {
    let mut rig = Rig::new();
    let original = rig.handle.parameters();
    let staged = altered(&original);

    rig.handle.set_parameters(staged).unwrap();
    assert_eq!(rig.handle.parameters(), staged);
    assert_eq!(rig.handle.motor_parameters().max_current, 8.0);
    assert_eq!(rig.handle.effective_parameters(), original);

    rig.ticks(10);
    assert_eq!(*rig.controller.effective_parameters(), original);

    rig.handle.set_setpoint(ControlMode::Current, 1.0, 0.5).unwrap();
    rig.tick();
    assert_eq!(rig.state(), State::Spinup);
    assert_eq!(*rig.controller.effective_parameters(), staged);
    assert_eq!(rig.handle.effective_parameters(), staged);
}

#[test]
fn stop_in_idle_commits() {
    let mut rig = Rig::new();
    let staged = altered(&rig.handle.parameters());
    rig.handle.set_parameters(staged).unwrap();

    rig.handle.stop();
    rig.tick();
    assert_eq!(rig.state(), State::Idle);
    assert_eq!(*rig.controller.effective_parameters(), staged);
}

#[test]
fn later_stage_overwrites_earlier() {
    let mut rig = Rig::new();
    let first = altered(&rig.handle.parameters());
    let mut second = first;
    second.motor.max_current = 6.0;

    rig.handle.set_parameters(first).unwrap();
    rig.handle.set_parameters(second).unwrap();
    rig.handle.stop();
    rig.tick();
    assert_eq!(rig.controller.effective_parameters().motor.max_current, 6.0);
}

#[test]
fn parameters_change_while_running_apply_after_stop() {
    let mut rig = Rig::new();
    rig.spin_up(ControlMode::Current, 1.0);
    let original = *rig.controller.effective_parameters();
    let staged = altered(&original);

    rig.handle.set_parameters(staged).unwrap();
    rig.run_for(0.05);
    assert_eq!(*rig.controller.effective_parameters(), original);

    rig.handle.stop();
    rig.tick();
    assert_eq!(*rig.controller.effective_parameters(), staged);
}

#[test]
fn invalid_parameters_are_refused() {
    let rig = Rig::new();
    let before = rig.handle.parameters();

    let mut bad = before;
    bad.motor.num_poles = 7;
    assert!(matches!(
        rig.handle.set_parameters(bad),
        Err(ConfigError::ValidationError(_))
    ));

    let mut bad = before;
    bad.motor.resistance = -0.1;
    assert!(matches!(
        rig.handle.set_parameters(bad),
        Err(ConfigError::ValidationError(_))
    ));

    let mut bad = before;
    bad.controller.identification_current = before.motor.max_current * 2.0;
    assert!(rig.handle.set_parameters(bad).is_err());

    assert_eq!(rig.handle.parameters(), before);
}

#[test]
fn identification_overrides_staged_motor_constants() {
    let mut rig = Rig::new();
    rig.handle.begin_motor_identification(Mode::Static).unwrap();
    rig.tick();
    assert_eq!(rig.state(), State::MotorIdentification);

    // Staged mid-run with a wrong resistance and a new telemetry cutoff.
    let mut staged = rig.handle.parameters();
    staged.motor.resistance = 0.5;
    staged.controller.telemetry_cutoff = 20.0;
    rig.handle.set_parameters(staged).unwrap();

    let done = rig.run_until(1.0, |r| r.state() == State::Idle);
    assert!(done);

    let effective = *rig.controller.effective_parameters();
    assert_eq!(effective.controller.telemetry_cutoff, 20.0);
    assert!((effective.motor.resistance - 0.1).abs() < 0.01);
    assert_eq!(rig.handle.parameters(), effective);
    assert_eq!(rig.handle.effective_parameters(), effective);
}
