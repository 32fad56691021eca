//! Integration test: observer invariants under arbitrary inputs.

use foc_common::params::{MotorParameters, ObserverParameters};
use foc_control_unit::observer::Observer;
use nalgebra::Vector2;
use proptest::prelude::*;

fn observer() -> Observer {
    Observer::from_motor(&ObserverParameters::default(), &MotorParameters::default()).unwrap()
}

fn step() -> impl Strategy<Value = (f64, [f64; 2], [f64; 2])> {
    (
        1e-5..1e-3f64,
        [-20.0..20.0f64, -20.0..20.0f64],
        [-5.0..5.0f64, -5.0..5.0f64],
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn angle_stays_wrapped(steps in prop::collection::vec(step(), 1..200)) {
        let mut obs = observer();
        for (dt, i, u) in steps {
            if obs.update(dt, &Vector2::from(i), &Vector2::from(u)).is_err() {
                break;
            }
            let theta = obs.angular_position();
            prop_assert!(theta > -std::f64::consts::PI && theta <= std::f64::consts::PI);
        }
    }

    #[test]
    fn covariance_stays_symmetric(steps in prop::collection::vec(step(), 1..200)) {
        let mut obs = observer();
        for (dt, i, u) in steps {
            if obs.update(dt, &Vector2::from(i), &Vector2::from(u)).is_err() {
                break;
            }
            let p = obs.covariance();
            for r in 0..4 {
                prop_assert!(p[(r, r)].is_finite());
                prop_assert!(p[(r, r)] >= 0.0);
                for c in 0..4 {
                    let scale = p[(r, c)].abs().max(1.0);
                    prop_assert!((p[(r, c)] - p[(c, r)]).abs() <= 1e-9 * scale);
                }
            }
        }
    }

    #[test]
    fn covariance_stays_positive_semidefinite(steps in prop::collection::vec(step(), 1..200)) {
        let mut obs = observer();
        for (dt, i, u) in steps {
            if obs.update(dt, &Vector2::from(i), &Vector2::from(u)).is_err() {
                break;
            }
            let p = *obs.covariance();
            let min_eigenvalue = p.symmetric_eigen().eigenvalues.min();
            prop_assert!(
                min_eigenvalue >= -1e-9 * p.amax().max(1.0),
                "min eigenvalue {} of {}",
                min_eigenvalue,
                p
            );
        }
    }

    #[test]
    fn invalid_step_leaves_state_untouched(
        warmup in prop::collection::vec(step(), 0..20),
        bad_dt in prop_oneof![Just(0.0), Just(-1e-4), Just(f64::NAN), Just(f64::INFINITY)],
    ) {
        let mut obs = observer();
        for (dt, i, u) in warmup {
            if obs.update(dt, &Vector2::from(i), &Vector2::from(u)).is_err() {
                break;
            }
        }
        let x = *obs.state();
        let p = *obs.covariance();
        prop_assert!(obs.update(bad_dt, &Vector2::new(1.0, 1.0), &Vector2::new(1.0, 1.0)).is_err());
        prop_assert_eq!(*obs.state(), x);
        prop_assert_eq!(*obs.covariance(), p);
    }

    #[test]
    fn interpolation_stays_wrapped(
        velocity in -5000.0..5000.0f64,
        angle in -10.0..10.0f64,
        dt in 0.0..1e-2f64,
    ) {
        let obs = observer().with_state(Vector2::zeros(), velocity, angle);
        let theta = obs.interpolated_angular_position(dt);
        prop_assert!(theta > -std::f64::consts::PI && theta <= std::f64::consts::PI);
    }
}
