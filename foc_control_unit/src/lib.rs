//! # FOC Control Unit Library
//!
//! Sensorless field-oriented control core for a three-phase BLDC/PMSM motor.
//! An extended Kalman filter estimates the rotor-frame currents, electrical
//! velocity and angle from measured phase currents and applied voltages; a
//! controller state machine sequences identification, hardware testing,
//! open-loop spin-up and closed-loop running around that estimate.
//!
//! ## Execution Contexts
//!
//! 1. **Tick** ([`facade::Controller::tick`]): fixed-rate, real-time. Samples
//!    the power stage, runs the active task, applies the output. No heap
//!    allocation, and shared locks are only ever tried, never waited on.
//! 2. **Facade** ([`facade::ControllerHandle`]): any thread. Queues requests,
//!    stages parameters and reads copied-out telemetry.
//!
//! The two only meet in [`shared::Shared`]: a bounded request queue, staged
//! parameters and a telemetry snapshot, each behind a short critical section.

#![deny(clippy::disallowed_types)]

pub mod command;
pub mod config;
pub mod control;
pub mod cycle;
pub mod driver;
pub mod facade;
pub mod observer;
pub mod shared;
pub mod sim;
pub mod state;
pub mod task;
