//! Workspace-wide constants.

/// Number of debug key/value slots exported by the controller.
pub const NUM_DEBUG_KEY_VALUE_PAIRS: usize = 4;

/// Maximum length of a debug key in ASCII characters.
pub const DEBUG_KEY_CAPACITY: usize = 3;

/// Capacity of the facade → real-time request queue.
pub const REQUEST_QUEUE_CAPACITY: usize = 8;

/// Default control tick rate [Hz].
pub const DEFAULT_TICK_RATE_HZ: u32 = 10_000;

/// Default control tick period [s].
pub const DEFAULT_TICK_PERIOD: f64 = 1.0 / DEFAULT_TICK_RATE_HZ as f64;
