//! Command processing root.
//!
//! Setpoint arbitration with time-to-live, parameter staging, and the
//! fixed-capacity request queue between the facade and the control tick.

pub mod arbitration;
pub mod queue;
pub mod staging;

use foc_common::state::State;
use thiserror::Error;

/// Rejection of a facade command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Another activity owns the motor.
    #[error("controller busy in state {0}")]
    Busy(State),

    /// Argument outside its accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Request queue is full; retry next tick.
    #[error("request queue full")]
    QueueFull,

    /// Setpoint would reverse a spinning motor; stop first.
    #[error("direction change requires a stop first")]
    DirectionChange,
}
