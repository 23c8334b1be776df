//! Identifier tracker
//!
//! The hardware layer hands out raw device indices that shift every time a
//! device is plugged in or removed. The tracker turns a raw index into a
//! logical joystick id that stays put while the device stays connected.
//!
//! The mapping is a heuristic driven by a single counter of connect events
//! seen since startup. It compensates for the platform giving low raw
//! indices to freshly plugged devices, and it can hand out the wrong id when
//! several devices connect or disconnect within one tick. Downstream
//! consumers depend on these exact ids, so the formula in [`resolve`] must
//! stay as it is.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Process-stable id of a connected joystick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JoystickId(pub i32);

impl fmt::Display for JoystickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "js{}", self.0)
    }
}

/// Derive a logical id from a raw index.
///
/// Pure function of its inputs:
///
/// 1. `candidate = counter - (raw_index + 1)`
/// 2. negative candidates are mirrored to their absolute value
/// 3. candidates at or past `device_count` are pulled down by one
pub fn resolve(raw_index: i32, device_count: i32, counter: i32) -> JoystickId {
    let mut candidate = counter - (raw_index + 1);
    if candidate < 0 {
        candidate = candidate.abs();
    }
    if candidate >= device_count {
        candidate -= 1;
    }
    JoystickId(candidate)
}

/// Owner of the connect counter.
///
/// The counter starts at `-1`, goes up by one per connect event and is never
/// decremented.
#[derive(Debug, Clone)]
pub struct IdTracker {
    counter: i32,
}

impl Default for IdTracker {
    fn default() -> Self {
        Self { counter: -1 }
    }
}

impl IdTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one connect event. Must run before the event's own index is
    /// resolved.
    pub fn record_connect(&mut self) {
        self.counter += 1;
        debug!("Connect counter now at {}", self.counter);
    }

    pub fn counter(&self) -> i32 {
        self.counter
    }

    pub fn resolve(&self, raw_index: i32, device_count: usize) -> JoystickId {
        resolve(raw_index, device_count as i32, self.counter)
    }
}
