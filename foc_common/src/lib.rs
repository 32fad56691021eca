//! FOC Common Library
//!
//! Plain data shared by the control core and everything that talks to it:
//! operating states, control modes, parameter sets, reports, fault flags and
//! TOML configuration loading. No control logic lives here.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`state`] - Controller state and control mode enums
//! - [`params`] - Motor, observer and controller parameter sets
//! - [`motor_id`] - Motor identification modes and results
//! - [`hw_test`] - Hardware test report
//! - [`fault`] - Latched fault flags and stop reasons
//! - [`debug`] - Fixed-capacity debug key/value pairs
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod debug;
pub mod fault;
pub mod motor_id;
pub mod params;
pub mod prelude;
pub mod state;
