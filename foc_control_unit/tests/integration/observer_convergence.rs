//! Integration test: observer convergence on synthetic measurements.
//!
//! The rotor spins at a constant electrical velocity with the current
//! regulated onto the q axis. The observer starts from rest and must lock on
//! from noisy d/q measurements and the steady-state voltage alone.

use foc_common::params::{MotorParameters, ObserverParameters};
use foc_control_unit::observer::Observer;
use nalgebra::Vector2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

const DT: f64 = 1e-4;
const TRUE_VELOCITY: f64 = 200.0;
const IQ: f64 = 5.0;
const STEPS: usize = 500;

fn motor(field_flux: f64, inductance: f64, resistance: f64) -> MotorParameters {
    MotorParameters {
        field_flux,
        inductance_d: inductance,
        inductance_q: inductance,
        resistance,
        ..MotorParameters::default()
    }
}

/// Run the synthetic scenario and return the final velocity estimate.
fn converge(motor: &MotorParameters, seed: u64) -> f64 {
    let params = ObserverParameters::default();
    let mut observer = Observer::from_motor(&params, motor).expect("observer");
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, params.r[0].sqrt()).expect("normal");

    let u = Vector2::new(
        -TRUE_VELOCITY * motor.inductance_q * IQ,
        motor.resistance * IQ + TRUE_VELOCITY * motor.field_flux,
    );
    for _ in 0..STEPS {
        let i = Vector2::new(noise.sample(&mut rng), IQ + noise.sample(&mut rng));
        observer.update(DT, &i, &u).expect("update");
    }
    observer.angular_velocity()
}

#[test]
fn velocity_converges_within_one_percent() {
    let m = motor(0.005, 50e-6, 0.1);
    for seed in 0..8 {
        let w = converge(&m, seed);
        let err = (w - TRUE_VELOCITY).abs() / TRUE_VELOCITY;
        assert!(err < 0.01, "seed {seed}: velocity {w}, error {err}");
    }
}

#[test]
fn converges_for_stiffer_motor() {
    let m = motor(0.02, 100e-6, 0.1);
    for seed in 0..8 {
        let w = converge(&m, seed);
        let err = (w - TRUE_VELOCITY).abs() / TRUE_VELOCITY;
        assert!(err < 0.01, "seed {seed}: velocity {w}, error {err}");
    }
}

#[test]
fn current_estimate_tracks_measurement() {
    let m = motor(0.005, 50e-6, 0.1);
    let params = ObserverParameters::default();
    let mut observer = Observer::from_motor(&params, &m).unwrap();
    let u = Vector2::new(
        -TRUE_VELOCITY * m.inductance_q * IQ,
        m.resistance * IQ + TRUE_VELOCITY * m.field_flux,
    );
    let i = Vector2::new(0.0, IQ);
    for _ in 0..STEPS {
        observer.update(DT, &i, &u).unwrap();
    }
    let idq = observer.idq();
    assert!(idq.x.abs() < 0.5, "i_d {}", idq.x);
    assert!((idq.y - IQ).abs() < 0.5, "i_q {}", idq.y);
    assert!((observer.angular_velocity() - TRUE_VELOCITY).abs() < 0.05 * TRUE_VELOCITY);
}

#[test]
fn angle_advances_with_velocity() {
    let m = motor(0.02, 100e-6, 0.1);
    let params = ObserverParameters::default();
    let mut observer = Observer::from_motor(&params, &m)
        .unwrap()
        .with_state(Vector2::new(0.0, IQ), TRUE_VELOCITY, 0.0);
    let u = Vector2::new(
        -TRUE_VELOCITY * m.inductance_q * IQ,
        m.resistance * IQ + TRUE_VELOCITY * m.field_flux,
    );
    let i = Vector2::new(0.0, IQ);
    let steps = 100;
    for _ in 0..steps {
        observer.update(DT, &i, &u).unwrap();
    }
    let expected = TRUE_VELOCITY * DT * steps as f64;
    assert!(
        (observer.angular_position() - expected).abs() < 0.01,
        "angle {} expected {expected}",
        observer.angular_position()
    );
}
