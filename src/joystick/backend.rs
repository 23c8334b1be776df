//! Hardware access facade
//!
//! Everything the poll loop needs from the input library, expressed as one
//! trait so the core never touches a concrete hardware API. Device indices
//! handed to and returned from the backend are *raw* indices: they are
//! reassigned by the platform whenever a device connects or disconnects.

use std::fmt;

/// Raw button state value the hardware reports for a pressed button.
pub const BUTTON_PRESSED: u8 = 1;

/// Raw button state value the hardware reports for a released button.
pub const BUTTON_RELEASED: u8 = 0;

/// One pending event as dequeued from the hardware layer.
///
/// Only lives for the duration of a single poll tick.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDeviceEvent {
    DeviceAdded {
        which: i32,
    },
    DeviceRemoved {
        which: i32,
    },
    AxisMotion {
        which: i32,
        axis: u8,
        value: i16,
    },
    Button {
        which: i32,
        button: u8,
        state: u8,
    },
    HatMotion {
        which: i32,
        hat: u8,
        value: u8,
    },
    /// Anything the core does not care about (battery, ff completion, ...)
    Other,
}

/// Errors reported by a [`JoystickBackend`]
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Failed to initialize joystick subsystem: {0}")]
    InitializationError(String),

    #[error("No device at raw index {0}")]
    InvalidDevice(i32),

    #[error("Device query failed: {0}")]
    QueryError(String),

    #[error("Haptic actuation failed: {0}")]
    HapticError(String),
}

/// Blocking hardware queries used by the poll loop.
///
/// Implementations are owned by exactly one poll task, so `&mut self` on
/// every call is fine. Query failures are returned as errors; callers
/// decide whether to substitute a zero value.
pub trait JoystickBackend: fmt::Debug + Send {
    /// Number of currently connected devices
    fn device_count(&self) -> usize;

    fn device_name(&self, index: i32) -> Result<String, BackendError>;

    fn axis_count(&self, index: i32) -> Result<usize, BackendError>;

    fn button_count(&self, index: i32) -> Result<usize, BackendError>;

    fn hat_count(&self, index: i32) -> Result<usize, BackendError>;

    /// Dequeue the next pending event, `None` when the queue is empty.
    fn next_event(&mut self) -> Option<RawDeviceEvent>;

    /// Play a rumble pulse. Devices without an actuator succeed silently.
    fn rumble(&mut self, index: i32, duration_ms: u32) -> Result<(), BackendError>;

    /// Release every open device handle. Called once at shutdown.
    fn release_all(&mut self);

    /// Names of all connected devices in raw-index order.
    ///
    /// Devices whose name cannot be read show up as an empty string.
    fn device_names(&self) -> Vec<String> {
        (0..self.device_count())
            .map(|index| self.device_name(index as i32).unwrap_or_default())
            .collect()
    }
}
