//! Integration test: hardware self-test.

use foc_common::fault::{FaultFlags, StopReason};
use foc_common::hw_test::HardwareTestFlags;
use foc_common::state::{ControlMode, State};
use foc_control_unit::sim::SimulationConfig;

use super::common::{Rig, matched_parameters};

fn run_test(rig: &mut Rig) {
    rig.handle.begin_hardware_test().unwrap();
    rig.tick();
    assert_eq!(rig.state(), State::HardwareTesting);
    let done = rig.run_until(0.5, |r| r.state() != State::HardwareTesting);
    assert!(done, "hardware test did not finish");
}

#[test]
fn healthy_stage_passes() {
    let mut rig = Rig::new();
    assert_eq!(rig.handle.hardware_test_report(), None);
    assert_eq!(rig.controller.power_stage().calibrations(), 1);

    run_test(&mut rig);
    assert_eq!(rig.state(), State::Idle);
    assert_eq!(rig.handle.stop_reason(), StopReason::HardwareTestPassed);
    assert_eq!(rig.controller.power_stage().calibrations(), 2);
    assert!(rig.controller.time() < 0.2);

    let report = rig.handle.hardware_test_report().unwrap();
    assert!(report.passed(), "{:?}", report.flags);
    assert!((report.inverter_voltage - 24.0).abs() < 1e-9);
    assert!(report.current_offset[0].abs() < 1e-9);
    assert!(report.phase_response.iter().all(|r| *r > 0.2), "{:?}", report.phase_response);
}

#[test]
fn passes_from_any_rotor_angle() {
    for initial_angle in [-2.0, -1.0, 0.5, 2.0, 3.0] {
        let sim = SimulationConfig {
            initial_angle,
            ..SimulationConfig::default()
        };
        let mut rig = Rig::with(matched_parameters(&sim), sim);
        run_test(&mut rig);
        let report = rig.handle.hardware_test_report().unwrap();
        assert!(report.passed(), "angle {initial_angle}: {:?}", report);
    }
}

#[test]
fn open_phases_fail() {
    let mut rig = Rig::new();
    rig.controller.power_stage_mut().set_disconnected(true);
    run_test(&mut rig);

    assert_eq!(rig.state(), State::Fault);
    assert!(rig.handle.faults().contains(FaultFlags::HARDWARE_TEST_FAILED));
    assert_eq!(rig.handle.error_count(), 1);

    let report = rig.handle.hardware_test_report().unwrap();
    assert_eq!(
        report.flags,
        HardwareTestFlags::ALPHA_NO_RESPONSE | HardwareTestFlags::BETA_NO_RESPONSE
    );
}

#[test]
fn recalibration_failure_fails() {
    let mut rig = Rig::new();
    rig.controller.power_stage_mut().set_calibration_failure(true);
    run_test(&mut rig);

    assert_eq!(rig.state(), State::Fault);
    let report = rig.handle.hardware_test_report().unwrap();
    assert!(report.flags.contains(HardwareTestFlags::CALIBRATION_FAILED));
}

#[test]
fn low_supply_is_reported() {
    let mut rig = Rig::new();
    rig.controller.power_stage_mut().set_inverter_voltage(6.0);
    run_test(&mut rig);

    assert_eq!(rig.state(), State::Fault);
    let report = rig.handle.hardware_test_report().unwrap();
    assert_eq!(report.flags, HardwareTestFlags::UNDERVOLTAGE);
    assert!(rig.controller.time() < 0.06);
}

#[test]
fn report_survives_until_next_run() {
    let mut rig = Rig::new();
    rig.controller.power_stage_mut().set_disconnected(true);
    run_test(&mut rig);
    assert!(!rig.handle.hardware_test_report().unwrap().passed());

    rig.handle.set_setpoint(ControlMode::Current, 0.0, 0.0).unwrap();
    rig.tick();
    assert_eq!(rig.state(), State::Idle);
    assert!(!rig.handle.hardware_test_report().unwrap().passed());

    rig.controller.power_stage_mut().set_disconnected(false);
    run_test(&mut rig);
    assert!(rig.handle.hardware_test_report().unwrap().passed());
}
