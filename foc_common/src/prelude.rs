//! Prelude module for common re-exports.
//!
//! ```rust
//! use foc_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig, Validate};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{DEFAULT_TICK_PERIOD, DEFAULT_TICK_RATE_HZ, NUM_DEBUG_KEY_VALUE_PAIRS};

// ─── Domain Types ───────────────────────────────────────────────────
pub use crate::debug::{DebugKeyValue, DebugKeyValues};
pub use crate::fault::{FaultFlags, StopReason};
pub use crate::hw_test::{HardwareTestFlags, HardwareTestReport};
pub use crate::motor_id::Mode as MotorIdentificationMode;
pub use crate::params::{ControllerParameters, MotorParameters, ObserverParameters, Parameters};
pub use crate::state::{ControlMode, State};
