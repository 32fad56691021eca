//! Integration test: status output, plot lines, error counter and beep.

use foc_common::state::{ControlMode, State};

use super::common::{DT, Rig};

fn status(rig: &Rig) -> String {
    let mut out = Vec::new();
    rig.handle.write_status_info(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn plot_fields(rig: &Rig) -> Vec<f64> {
    let mut out = Vec::new();
    rig.handle.write_plot_line(&mut out).unwrap();
    let line = String::from_utf8(out).unwrap();
    assert!(line.ends_with('\n'));
    assert_eq!(line.lines().count(), 1);
    line.split_whitespace().map(|f| f.parse().unwrap()).collect()
}

#[test]
fn status_block_describes_idle_controller() {
    let mut rig = Rig::new();
    rig.ticks(10);
    let text = status(&rig);
    assert!(text.contains("State:       Idle"), "{text}");
    assert!(text.contains("Setpoint:    none"), "{text}");
    assert!(text.contains("Errors:      0"), "{text}");
    assert!(text.contains("(10 ticks)"), "{text}");
    assert!(text.contains("poles=14"), "{text}");
    assert!(!text.contains("HW test"), "{text}");
}

#[test]
fn status_block_while_running() {
    let mut rig = Rig::new();
    rig.hold_setpoint(ControlMode::Current, 1.0, 0.5, 0.5);
    let text = status(&rig);
    assert!(text.contains("State:       Running"), "{text}");
    assert!(text.contains("Setpoint:    Current 1"), "{text}");
    assert!(text.contains("Vdc: 24.00 V"), "{text}");
}

#[test]
fn status_block_lists_hardware_test_findings() {
    let mut rig = Rig::new();
    rig.controller.power_stage_mut().set_disconnected(true);
    rig.handle.begin_hardware_test().unwrap();
    rig.run_for(0.2);
    let text = status(&rig);
    assert!(text.contains("State:       Fault"), "{text}");
    assert!(text.contains("HARDWARE_TEST_FAILED"), "{text}");
    assert!(text.contains("ALPHA_NO_RESPONSE"), "{text}");
    assert!(text.contains("BETA_NO_RESPONSE"), "{text}");
}

#[test]
fn plot_line_has_eleven_columns() {
    let mut rig = Rig::new();
    rig.hold_setpoint(ControlMode::Current, 1.0, 0.5, 0.5);
    let fields = plot_fields(&rig);
    assert_eq!(fields.len(), 11);

    let t = rig.handle.telemetry();
    assert!((fields[0] - t.time).abs() < 1e-4);
    assert_eq!(fields[1], f64::from(State::Running as u8));
    assert!((fields[4] - t.mechanical_rpm_filtered).abs() < 0.01);
    assert!((fields[9] - t.electrical_velocity).abs() < 0.01);
}

#[test]
fn invalid_time_steps_are_counted_and_ignored() {
    let mut rig = Rig::new();
    rig.ticks(5);
    let ticks = rig.handle.telemetry().tick_count;
    let time = rig.controller.time();

    for dt in [0.0, -DT, f64::NAN, f64::INFINITY] {
        rig.controller.tick(dt);
    }
    assert_eq!(rig.handle.error_count(), 4);
    assert_eq!(rig.controller.time(), time);
    assert_eq!(rig.handle.telemetry().tick_count, ticks);
    assert_eq!(rig.state(), State::Idle);
}

#[test]
fn oversized_time_step_is_counted_while_running() {
    let mut rig = Rig::new();
    rig.spin_up(ControlMode::Current, 1.0);
    rig.controller.power_stage_mut().advance(DT);
    rig.controller.tick(20.0 * DT);
    assert_eq!(rig.handle.error_count(), 1);
    assert_eq!(rig.state(), State::Running);
}

#[test]
fn error_count_never_decreases() {
    let mut rig = Rig::new();
    rig.handle.set_setpoint(ControlMode::Current, 1.0, 0.05).unwrap();
    rig.run_for(0.1);
    assert_eq!(rig.handle.error_count(), 1);

    rig.handle.stop();
    rig.tick();
    rig.controller.tick(0.0);
    assert_eq!(rig.handle.error_count(), 2);
    rig.ticks(10);
    assert_eq!(rig.handle.error_count(), 2);
}

#[test]
fn beep_plays_for_its_duration() {
    let mut rig = Rig::new();
    rig.handle.beep(1000.0, 0.05).unwrap();
    rig.tick();
    assert!(!rig.controller.last_actuation().is_disabled());
    assert_eq!(rig.state(), State::Idle);

    let ended = rig.run_until(0.1, |r| r.controller.last_actuation().is_disabled());
    assert!(ended);
    let t = rig.controller.time();
    assert!((t - 0.0501).abs() < 3.0 * DT, "beep ended at {t}");

    // The controller is free for a setpoint afterwards.
    rig.spin_up(ControlMode::Current, 1.0);
}

#[test]
fn print_helpers_write_to_stdout() {
    let rig = Rig::new();
    rig.handle.print_status_info().unwrap();
    rig.handle.plot_real_time_values().unwrap();
}
