//! Event normalizer
//!
//! Turns one [`RawDeviceEvent`] into a typed record. Device indices are
//! resolved through the [`IdTracker`]; connect events bump its counter first.
//! Count queries that fail are recovered as zero so a stale handle never
//! aborts a tick.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backend::{JoystickBackend, RawDeviceEvent, BUTTON_PRESSED};
use super::tracker::{IdTracker, JoystickId};

/// Divisor that maps a signed 16-bit axis reading onto `[-1.0, 1.0]`.
///
/// `-32768` therefore lands slightly below `-1.0`. Values are not clamped.
pub const AXIS_MAX: f64 = 32767.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisEvent {
    pub axis_id: u8,
    pub joystick: JoystickId,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEvent {
    pub button_id: u8,
    pub joystick: JoystickId,
    pub pressed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HatEvent {
    pub hat_id: u8,
    /// Raw directional bitmask as reported by the hardware
    pub angle: u8,
    pub joystick: JoystickId,
}

/// Snapshot of a device taken when it was seen, not a live handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoystickRecord {
    pub id: JoystickId,
    pub num_axes: usize,
    pub num_buttons: usize,
    pub display_name: String,
}

/// Ordered device names plus their count
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceList {
    pub names: Vec<String>,
    pub count: usize,
}

impl DeviceList {
    pub fn query(backend: &dyn JoystickBackend) -> Self {
        let names = backend.device_names();
        let count = backend.device_count();
        Self { names, count }
    }
}

/// Result of normalizing one raw event
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Axis(AxisEvent),
    Button(ButtonEvent),
    Hat(HatEvent),
    /// Subscribers only see the `devices` half, as `DeviceListChanged`;
    /// `record` is logged by the poll loop.
    Connected {
        record: JoystickRecord,
        devices: DeviceList,
    },
    Disconnected {
        devices: DeviceList,
    },
}

pub fn normalize_axis(raw: i16) -> f64 {
    f64::from(raw) / AXIS_MAX
}

/// Translate one raw event. Returns `None` for event kinds nobody listens to.
pub fn normalize(
    event: &RawDeviceEvent,
    tracker: &mut IdTracker,
    backend: &dyn JoystickBackend,
) -> Option<Normalized> {
    match *event {
        RawDeviceEvent::DeviceAdded { which } => {
            tracker.record_connect();
            let record = joystick_record(which, tracker, backend);
            Some(Normalized::Connected {
                record,
                devices: DeviceList::query(backend),
            })
        }
        RawDeviceEvent::DeviceRemoved { which } => {
            debug!("Device at raw index {} removed", which);
            Some(Normalized::Disconnected {
                devices: DeviceList::query(backend),
            })
        }
        RawDeviceEvent::AxisMotion { which, axis, value } => Some(Normalized::Axis(AxisEvent {
            axis_id: axis,
            joystick: tracker.resolve(which, backend.device_count()),
            value: normalize_axis(value),
        })),
        RawDeviceEvent::Button {
            which,
            button,
            state,
        } => Some(Normalized::Button(ButtonEvent {
            button_id: button,
            joystick: tracker.resolve(which, backend.device_count()),
            pressed: state == BUTTON_PRESSED,
        })),
        RawDeviceEvent::HatMotion { which, hat, value } => Some(Normalized::Hat(HatEvent {
            hat_id: hat,
            angle: value,
            joystick: tracker.resolve(which, backend.device_count()),
        })),
        RawDeviceEvent::Other => None,
    }
}

/// Build a [`JoystickRecord`] for the device currently at `raw_index`.
pub fn joystick_record(
    raw_index: i32,
    tracker: &IdTracker,
    backend: &dyn JoystickBackend,
) -> JoystickRecord {
    let num_axes = backend.axis_count(raw_index).unwrap_or_else(|e| {
        debug!("Axis count unavailable for raw index {}: {}", raw_index, e);
        0
    });
    let num_buttons = backend.button_count(raw_index).unwrap_or_else(|e| {
        debug!("Button count unavailable for raw index {}: {}", raw_index, e);
        0
    });
    let display_name = backend.device_name(raw_index).unwrap_or_else(|e| {
        debug!("Name unavailable for raw index {}: {}", raw_index, e);
        String::new()
    });

    JoystickRecord {
        id: tracker.resolve(raw_index, backend.device_count()),
        num_axes,
        num_buttons,
        display_name,
    }
}

pub fn axis_name(axis: u8) -> String {
    format!("Axis {}", axis)
}

pub fn button_name(button: u8) -> String {
    format!("Button {}", button)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joystick::backend::BUTTON_RELEASED;
    use crate::joystick::scripted_backend::{ScriptedBackend, ScriptedDevice};

    fn backend_with(devices: usize) -> ScriptedBackend {
        let backend = ScriptedBackend::new();
        for i in 0..devices {
            backend.plug(ScriptedDevice::new(&format!("Pad {}", i), 6, 12, 1));
        }
        backend.clear_queue();
        backend
    }

    #[test]
    fn axis_extremes() {
        assert_eq!(normalize_axis(32767), 1.0);
        assert_eq!(normalize_axis(0), 0.0);
        assert!(normalize_axis(-32768) < -1.0);
    }

    #[test]
    fn axis_event_resolves_joystick() {
        let backend = backend_with(1);
        let mut tracker = IdTracker::new();
        tracker.record_connect();
        tracker.record_connect();

        let event = RawDeviceEvent::AxisMotion {
            which: 0,
            axis: 3,
            value: 32767,
        };
        let normalized = normalize(&event, &mut tracker, &backend);
        assert_eq!(
            normalized,
            Some(Normalized::Axis(AxisEvent {
                axis_id: 3,
                joystick: JoystickId(0),
                value: 1.0,
            }))
        );
    }

    #[test]
    fn only_the_pressed_constant_counts_as_pressed() {
        let backend = backend_with(1);
        let mut tracker = IdTracker::new();

        for (state, expected) in [(BUTTON_PRESSED, true), (BUTTON_RELEASED, false), (7, false)] {
            let event = RawDeviceEvent::Button {
                which: 0,
                button: 2,
                state,
            };
            match normalize(&event, &mut tracker, &backend) {
                Some(Normalized::Button(button)) => assert_eq!(button.pressed, expected),
                other => panic!("unexpected normalization: {:?}", other),
            }
        }
    }

    #[test]
    fn hat_value_passes_through() {
        let backend = backend_with(1);
        let mut tracker = IdTracker::new();
        let event = RawDeviceEvent::HatMotion {
            which: 0,
            hat: 0,
            value: 0b0011,
        };
        match normalize(&event, &mut tracker, &backend) {
            Some(Normalized::Hat(hat)) => {
                assert_eq!(hat.angle, 3);
                assert_eq!(hat.hat_id, 0);
            }
            other => panic!("unexpected normalization: {:?}", other),
        }
    }

    #[test]
    fn normalizing_twice_is_structurally_equal() {
        let backend = backend_with(2);
        let mut tracker = IdTracker::new();
        let event = RawDeviceEvent::Button {
            which: 1,
            button: 4,
            state: BUTTON_PRESSED,
        };
        let first = normalize(&event, &mut tracker, &backend);
        let second = normalize(&event, &mut tracker, &backend);
        assert_eq!(first, second);
    }

    #[test]
    fn connect_bumps_counter_and_builds_record() {
        let backend = backend_with(1);
        let mut tracker = IdTracker::new();
        let event = RawDeviceEvent::DeviceAdded { which: 0 };

        let normalized = normalize(&event, &mut tracker, &backend);
        assert_eq!(tracker.counter(), 0);
        assert_eq!(
            normalized,
            Some(Normalized::Connected {
                record: JoystickRecord {
                    id: JoystickId(0),
                    num_axes: 6,
                    num_buttons: 12,
                    display_name: "Pad 0".to_string(),
                },
                devices: DeviceList {
                    names: vec!["Pad 0".to_string()],
                    count: 1,
                },
            })
        );
    }

    #[test]
    fn disconnect_does_not_touch_counter() {
        let backend = backend_with(0);
        let mut tracker = IdTracker::new();
        let event = RawDeviceEvent::DeviceRemoved { which: 0 };

        let normalized = normalize(&event, &mut tracker, &backend);
        assert_eq!(tracker.counter(), -1);
        assert_eq!(
            normalized,
            Some(Normalized::Disconnected {
                devices: DeviceList::default(),
            })
        );
    }

    #[test]
    fn stale_index_yields_zero_counts() {
        let backend = backend_with(0);
        let mut tracker = IdTracker::new();
        tracker.record_connect();

        let record = joystick_record(5, &tracker, &backend);
        assert_eq!(record.num_axes, 0);
        assert_eq!(record.num_buttons, 0);
        assert_eq!(record.display_name, "");
    }

    #[test]
    fn unknown_events_are_skipped() {
        let backend = backend_with(1);
        let mut tracker = IdTracker::new();
        assert_eq!(normalize(&RawDeviceEvent::Other, &mut tracker, &backend), None);
    }

    #[test]
    fn display_names() {
        assert_eq!(axis_name(2), "Axis 2");
        assert_eq!(button_name(10), "Button 10");
    }
}
