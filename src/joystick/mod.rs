//! Joystick subsystem
//!
//! Polls the hardware queue on a fixed cadence and republishes what it finds
//! as typed events:
//!
//! 1. [`backend`] - hardware access facade ([`gilrs_backend`] in production,
//!    [`scripted_backend`] in tests)
//! 2. [`tracker`] - raw device index to stable joystick id
//! 3. [`normalizer`] - raw event to typed record
//! 4. [`poll_driver`] - `Idle`/`Draining` loop that drains the queue per tick
//! 5. [`event_bus`] - publish/subscribe boundary
//! 6. [`manager_handle`] - spawning, commands and shutdown
//!
//! # Architecture
//!
//! ```text
//! Hardware ──► PollDriver ──► Normalizer ──► EventBus ──► Subscribers
//!              (drain)        (+ IdTracker)   (publish)
//! ```
//!
//! The first drain happens after a warm-up delay (500ms by default) so device
//! enumeration can settle, every later one after the update interval (50ms).

pub mod backend;
pub mod event_bus;
pub mod gilrs_backend;
pub mod manager_handle;
pub mod normalizer;
pub mod poll_driver;
pub mod scripted_backend;
pub mod tracker;

pub use backend::{BackendError, JoystickBackend, RawDeviceEvent};
pub use event_bus::{EventBus, JoystickEvent};
pub use manager_handle::{GamepadManager, ManagerError, ManagerHandle};
pub use normalizer::{axis_name, button_name, AxisEvent, ButtonEvent, DeviceList, HatEvent, JoystickRecord};
pub use tracker::{resolve, IdTracker, JoystickId};
