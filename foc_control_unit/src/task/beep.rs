//! Audible tone through the motor windings.

use super::{ControlTask, TaskStep};
use crate::driver::{Actuation, Sample};

/// Square-wave voltage on α for a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeepTask {
    frequency: f64,
    duration: f64,
    amplitude: f64,
    elapsed: f64,
}

impl BeepTask {
    pub fn new(frequency: f64, duration: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            duration,
            amplitude,
            elapsed: 0.0,
        }
    }
}

impl ControlTask for BeepTask {
    type Output = ();

    fn step(&mut self, dt: f64, _sample: &Sample) -> TaskStep<()> {
        self.elapsed += dt;
        if self.elapsed >= self.duration {
            return TaskStep::done(Actuation::Disabled, ());
        }
        let half = if (self.elapsed * self.frequency).fract() < 0.5 { 1.0 } else { -1.0 };
        TaskStep::running(Actuation::Voltage([half * self.amplitude, 0.0]))
    }
}
