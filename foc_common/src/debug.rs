//! Named debug values with fixed-capacity keys.

use heapless::String;
use serde::Serialize;
use static_assertions::const_assert;

use crate::consts::{DEBUG_KEY_CAPACITY, NUM_DEBUG_KEY_VALUE_PAIRS};

/// Debug key: at most three ASCII characters, stored inline.
pub type DebugKey = String<DEBUG_KEY_CAPACITY>;

/// One exported debug value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugKeyValue {
    /// Slot name.
    pub key: DebugKey,
    /// Current value.
    pub value: f64,
}

impl DebugKeyValue {
    /// Build a pair; returns `None` if the key is not ASCII or too long.
    pub fn new(key: &str, value: f64) -> Option<Self> {
        if !key.is_ascii() {
            return None;
        }
        let mut k = DebugKey::new();
        k.push_str(key).ok()?;
        Some(Self { key: k, value })
    }
}

/// Fixed set of debug pairs exported per call.
pub type DebugKeyValues = [DebugKeyValue; NUM_DEBUG_KEY_VALUE_PAIRS];

/// Slot names, in export order.
pub const DEBUG_KEYS: [&str; NUM_DEBUG_KEY_VALUE_PAIRS] = ["Id", "Iq", "Wel", "Vdc"];

const_assert!(DEBUG_KEYS[0].len() <= DEBUG_KEY_CAPACITY);
const_assert!(DEBUG_KEYS[1].len() <= DEBUG_KEY_CAPACITY);
const_assert!(DEBUG_KEYS[2].len() <= DEBUG_KEY_CAPACITY);
const_assert!(DEBUG_KEYS[3].len() <= DEBUG_KEY_CAPACITY);

/// Pair the fixed slot names with their values.
pub fn debug_key_values(values: [f64; NUM_DEBUG_KEY_VALUE_PAIRS]) -> DebugKeyValues {
    core::array::from_fn(|i| {
        let mut key = DebugKey::new();
        // Slot names are checked against the capacity at compile time.
        let _ = key.push_str(DEBUG_KEYS[i]);
        DebugKeyValue {
            key,
            value: values[i],
        }
    })
}
