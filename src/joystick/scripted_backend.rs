//! In-memory joystick backend
//!
//! Devices and events are fed in by hand, which makes the poll loop testable
//! without hardware. Clones share the same state, so a test can keep one
//! clone for feeding and inspection while the manager owns the other.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::backend::{BackendError, JoystickBackend, RawDeviceEvent, BUTTON_PRESSED, BUTTON_RELEASED};

/// A fake device as seen by [`ScriptedBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedDevice {
    pub name: String,
    pub axes: usize,
    pub buttons: usize,
    pub hats: usize,
    pub haptic: bool,
}

impl ScriptedDevice {
    pub fn new(name: &str, axes: usize, buttons: usize, hats: usize) -> Self {
        Self {
            name: name.to_string(),
            axes,
            buttons,
            hats,
            haptic: false,
        }
    }

    pub fn with_haptic(mut self) -> Self {
        self.haptic = true;
        self
    }
}

#[derive(Debug, Default)]
struct Script {
    devices: Vec<ScriptedDevice>,
    queue: VecDeque<RawDeviceEvent>,
    rumbles: Vec<(i32, u32)>,
    drains: usize,
    released: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect a device at the end of the enumeration and queue its
    /// connect event. Returns the raw index it landed on.
    pub fn plug(&self, device: ScriptedDevice) -> i32 {
        let mut script = self.script();
        script.devices.push(device);
        let which = script.devices.len() as i32 - 1;
        script.queue.push_back(RawDeviceEvent::DeviceAdded { which });
        which
    }

    /// Remove the device at `which`; later devices shift down by one.
    pub fn unplug(&self, which: i32) {
        let mut script = self.script();
        if which >= 0 && (which as usize) < script.devices.len() {
            script.devices.remove(which as usize);
        }
        script.queue.push_back(RawDeviceEvent::DeviceRemoved { which });
    }

    pub fn push(&self, event: RawDeviceEvent) {
        self.script().queue.push_back(event);
    }

    pub fn move_axis(&self, which: i32, axis: u8, value: i16) {
        self.push(RawDeviceEvent::AxisMotion { which, axis, value });
    }

    pub fn press(&self, which: i32, button: u8, pressed: bool) {
        let state = if pressed { BUTTON_PRESSED } else { BUTTON_RELEASED };
        self.push(RawDeviceEvent::Button {
            which,
            button,
            state,
        });
    }

    pub fn move_hat(&self, which: i32, hat: u8, value: u8) {
        self.push(RawDeviceEvent::HatMotion { which, hat, value });
    }

    pub fn clear_queue(&self) {
        self.script().queue.clear();
    }

    pub fn pending(&self) -> usize {
        self.script().queue.len()
    }

    /// Rumble pulses actually played, as `(raw index, duration)`
    pub fn rumbles(&self) -> Vec<(i32, u32)> {
        self.script().rumbles.clone()
    }

    /// How many times the queue has been drained empty
    pub fn drains(&self) -> usize {
        self.script().drains
    }

    pub fn released(&self) -> bool {
        self.script().released
    }

    fn with_device<T>(
        &self,
        index: i32,
        f: impl FnOnce(&ScriptedDevice) -> T,
    ) -> Result<T, BackendError> {
        let script = self.script();
        usize::try_from(index)
            .ok()
            .and_then(|i| script.devices.get(i))
            .map(f)
            .ok_or(BackendError::InvalidDevice(index))
    }
}

impl JoystickBackend for ScriptedBackend {
    fn device_count(&self) -> usize {
        self.script().devices.len()
    }

    fn device_name(&self, index: i32) -> Result<String, BackendError> {
        self.with_device(index, |d| d.name.clone())
    }

    fn axis_count(&self, index: i32) -> Result<usize, BackendError> {
        self.with_device(index, |d| d.axes)
    }

    fn button_count(&self, index: i32) -> Result<usize, BackendError> {
        self.with_device(index, |d| d.buttons)
    }

    fn hat_count(&self, index: i32) -> Result<usize, BackendError> {
        self.with_device(index, |d| d.hats)
    }

    fn next_event(&mut self) -> Option<RawDeviceEvent> {
        let mut script = self.script();
        let event = script.queue.pop_front();
        if event.is_none() {
            script.drains += 1;
        }
        event
    }

    fn rumble(&mut self, index: i32, duration_ms: u32) -> Result<(), BackendError> {
        if self.with_device(index, |d| d.haptic)? {
            self.script().rumbles.push((index, duration_ms));
        }
        Ok(())
    }

    fn release_all(&mut self) {
        self.script().released = true;
    }
}
