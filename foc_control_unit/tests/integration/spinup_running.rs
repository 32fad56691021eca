//! Integration test: spin-up, observer handover and closed-loop running.
//!
//! Default plant: 7 pole pairs, φ = 4.29 mWb, 24 V bus. With 1 A of torque
//! current the rotor settles where friction balances the torque, about
//! 315 rad/s electrical.

use foc_common::fault::{FaultFlags, StopReason};
use foc_common::state::{ControlMode, State};
use foc_control_unit::control::transforms::wrap_angle;
use foc_control_unit::sim::SimulationConfig;

use super::common::{Rig, matched_parameters};

const TTL: f64 = 0.5;

fn assert_close(actual: f64, expected: f64, rel: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= rel * expected.abs(),
        "{what}: {actual} not within {rel} of {expected}"
    );
}

#[test]
fn current_mode_hands_over_and_tracks() {
    let mut rig = Rig::new();
    rig.handle.set_setpoint(ControlMode::Current, 1.0, TTL).unwrap();
    rig.tick();
    assert_eq!(rig.state(), State::Spinup);

    let running = rig.run_until(0.3, |r| r.state() == State::Running);
    assert!(running, "no handover by 0.3 s");
    assert!(rig.controller.time() > 0.1);

    rig.hold_setpoint(ControlMode::Current, 1.0, TTL, 0.7);
    assert_eq!(rig.state(), State::Running);

    let motor = rig.motor();
    let (w, theta, idq) = (motor.velocity(), motor.angle(), motor.idq());
    assert_close(w, 315.0, 0.1, "plant velocity");

    let t = rig.handle.telemetry();
    assert_close(t.electrical_velocity, w, 0.02, "estimated velocity");
    assert!(
        wrap_angle(t.electrical_angle - theta).abs() < 0.1,
        "angle error {}",
        wrap_angle(t.electrical_angle - theta)
    );
    assert!(idq.x.abs() < 0.1, "plant i_d {}", idq.x);
    assert_close(idq.y, 1.0, 0.05, "plant i_q");

    assert_close(rig.handle.instant_mechanical_rpm(), motor.mechanical_rpm(), 0.1, "rpm");
    assert_close(rig.handle.instant_current_filtered(), 1.0, 0.15, "filtered current");
    let demand = rig.handle.instant_demand_factor_filtered();
    assert!(demand > 0.0 && demand < 100.0, "demand {demand}");
    assert_eq!(t.setpoint, Some((ControlMode::Current, 1.0)));
    assert_eq!(rig.handle.error_count(), 0);
}

#[test]
fn debug_values_follow_the_estimate() {
    let mut rig = Rig::new();
    rig.hold_setpoint(ControlMode::Current, 1.0, TTL, 0.6);
    let pairs = rig.handle.debug_key_value_pairs();
    let keys: Vec<&str> = pairs.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, ["Id", "Iq", "Wel", "Vdc"]);

    let t = rig.handle.telemetry();
    assert_eq!(pairs[0].value, t.idq[0]);
    assert_eq!(pairs[1].value, t.idq[1]);
    assert_eq!(pairs[2].value, t.electrical_velocity);
    assert_eq!(pairs[3].value, 24.0);
}

#[test]
fn speed_mode_reaches_target_rpm() {
    let mut rig = Rig::new();
    rig.hold_setpoint(ControlMode::MechanicalRpm, 1000.0, TTL, 1.5);
    assert_eq!(rig.state(), State::Running);
    assert_close(rig.motor().mechanical_rpm(), 1000.0, 0.05, "plant rpm");
    assert_close(rig.handle.instant_mechanical_rpm(), 1000.0, 0.05, "reported rpm");
}

#[test]
fn negative_setpoint_spins_backwards() {
    let mut rig = Rig::new();
    rig.hold_setpoint(ControlMode::Current, -1.0, TTL, 1.0);
    assert_eq!(rig.state(), State::Running);
    assert_close(rig.motor().velocity(), -315.0, 0.1, "plant velocity");
    assert!(rig.handle.telemetry().electrical_velocity < 0.0);
    assert!(rig.handle.instant_mechanical_rpm() < 0.0);
}

#[test]
fn ratiometric_voltage_mode() {
    let mut rig = Rig::new();
    rig.hold_setpoint(ControlMode::RatiometricVoltage, 0.1, TTL, 1.0);
    assert_eq!(rig.state(), State::Running);
    let w = rig.motor().velocity();
    assert!(w > 200.0 && w < 400.0, "velocity {w}");
    assert_close(rig.handle.instant_demand_factor_filtered(), 10.0, 0.2, "demand");
}

#[test]
fn ratiometric_current_mode() {
    let mut rig = Rig::new();
    // 10 % of the 10 A limit.
    rig.hold_setpoint(ControlMode::RatiometricCurrent, 0.1, TTL, 1.0);
    assert_eq!(rig.state(), State::Running);
    assert_close(rig.motor().velocity(), 315.0, 0.1, "plant velocity");
}

#[test]
fn handover_from_any_rotor_angle() {
    for initial_angle in [1.0, 2.5, -2.0] {
        let sim = SimulationConfig {
            initial_angle,
            ..SimulationConfig::default()
        };
        let mut rig = Rig::with(matched_parameters(&sim), sim);
        rig.hold_setpoint(ControlMode::Current, 1.0, TTL, 0.8);
        assert_eq!(rig.state(), State::Running, "initial angle {initial_angle}");
        assert!(rig.motor().velocity() > 250.0, "initial angle {initial_angle}");
    }
}

#[test]
fn runs_with_measurement_noise() {
    let sim = SimulationConfig {
        current_noise: 0.05,
        seed: 3,
        ..SimulationConfig::default()
    };
    let mut rig = Rig::with(matched_parameters(&sim), sim);
    rig.hold_setpoint(ControlMode::Current, 1.0, TTL, 1.0);
    assert_eq!(rig.state(), State::Running);
    assert_close(rig.motor().velocity(), 315.0, 0.15, "plant velocity");
    assert_close(
        rig.handle.telemetry().electrical_velocity,
        rig.motor().velocity(),
        0.05,
        "estimated velocity",
    );
}

#[test]
fn locked_rotor_aborts_spinup() {
    let sim = SimulationConfig {
        inertia: 1e3,
        ..SimulationConfig::default()
    };
    let mut rig = Rig::with(matched_parameters(&sim), sim);
    rig.handle.set_setpoint(ControlMode::Current, 1.0, 5.0).unwrap();
    let stopped = rig.run_until(2.5, |r| r.state() == State::Idle);
    assert!(stopped);
    assert_eq!(rig.handle.stop_reason(), StopReason::SpinupFailed);
    assert!(rig.handle.faults().is_empty());
    assert_eq!(rig.handle.error_count(), 1);
    assert!(rig.controller.last_actuation().is_disabled());
}

#[test]
fn undervoltage_while_running_latches_fault() {
    let mut rig = Rig::new();
    rig.spin_up(ControlMode::Current, 1.0);
    rig.controller.power_stage_mut().set_inverter_voltage(5.0);
    rig.tick();

    assert_eq!(rig.state(), State::Fault);
    assert!(rig.handle.faults().contains(FaultFlags::UNDERVOLTAGE));
    assert_eq!(rig.handle.error_count(), 1);
    assert!(rig.controller.last_actuation().is_disabled());

    // The rotor coasts down with the bridge off.
    let w0 = rig.motor().velocity();
    rig.run_for(0.05);
    assert!(rig.motor().velocity() < w0);
    assert_eq!(rig.state(), State::Fault);
}
