use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Replay, Ticks};
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::backend::{BackendError, JoystickBackend, RawDeviceEvent, BUTTON_PRESSED, BUTTON_RELEASED};

pub const HAT_CENTERED: u8 = 0x00;
pub const HAT_UP: u8 = 0x01;
pub const HAT_RIGHT: u8 = 0x02;
pub const HAT_DOWN: u8 = 0x04;
pub const HAT_LEFT: u8 = 0x08;

// Axis ids handed out in raw events; the d-pad is reported as hat 0 instead
const AXES: [Axis; 6] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::LeftZ,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::RightZ,
];

const BUTTONS: [Button; 15] = [
    Button::South,
    Button::East,
    Button::North,
    Button::West,
    Button::C,
    Button::Z,
    Button::LeftTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
];

const DPAD_BUTTONS: [(Button, u8); 4] = [
    (Button::DPadUp, HAT_UP),
    (Button::DPadRight, HAT_RIGHT),
    (Button::DPadDown, HAT_DOWN),
    (Button::DPadLeft, HAT_LEFT),
];

// Threshold for treating a d-pad axis as pushed
const DPAD_AXIS_THRESHOLD: f32 = 0.5;

const RUMBLE_MAGNITUDE: u16 = u16::MAX;

/// Joystick backend on top of gilrs.
///
/// Raw indices are positions in the list of currently connected gamepads:
/// new pads are appended and removing one shifts every later pad down.
pub struct GilrsBackend {
    gilrs: Gilrs,

    // Connected gamepads in raw-index order
    connected: RawIndexList<GamepadId>,

    // Events produced here rather than by gilrs (startup enumeration)
    pending: VecDeque<RawDeviceEvent>,

    // Current d-pad bitmask per gamepad
    hats: HashMap<GamepadId, u8>,

    // Playing rumble effects and when they end
    effects: Vec<(Effect, Instant)>,
}

impl fmt::Debug for GilrsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GilrsBackend")
            .field("connected", &self.connected)
            .field("hats", &self.hats)
            .field("active_effects", &self.effects.len())
            .finish()
    }
}

impl GilrsBackend {
    pub fn new() -> Result<Self, BackendError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(BackendError::InitializationError(e.to_string()));
            }
        };

        let mut backend = Self {
            gilrs,
            connected: RawIndexList::new(),
            pending: VecDeque::new(),
            hats: HashMap::new(),
            effects: Vec::new(),
        };

        // Pads present before startup get a connect event like any other
        let present: Vec<(GamepadId, String)> = backend
            .gilrs
            .gamepads()
            .map(|(id, gamepad)| (id, gamepad.name().to_string()))
            .collect();
        for (id, name) in present {
            if let Some(which) = backend.connected.connect(id) {
                info!("  [{}] ID: {}, Name: {}", which, id, name);
                backend.pending.push_back(RawDeviceEvent::DeviceAdded { which });
            }
        }

        Ok(backend)
    }

    fn gamepad_id(&self, index: i32) -> Option<GamepadId> {
        self.connected.get(index)
    }

    fn raw_index(&self, id: GamepadId) -> i32 {
        self.connected.position(id)
    }

    fn with_gamepad<T>(
        &self,
        index: i32,
        f: impl FnOnce(gilrs::Gamepad<'_>) -> T,
    ) -> Result<T, BackendError> {
        let id = self
            .gamepad_id(index)
            .ok_or(BackendError::InvalidDevice(index))?;
        self.gilrs
            .connected_gamepad(id)
            .map(f)
            .ok_or_else(|| BackendError::QueryError(format!("gamepad {} is not connected", id)))
    }

    fn set_hat(&mut self, id: GamepadId, mask: u8) -> RawDeviceEvent {
        self.hats.insert(id, mask);
        RawDeviceEvent::HatMotion {
            which: self.raw_index(id),
            hat: 0,
            value: mask,
        }
    }

    fn hat_mask(&self, id: GamepadId) -> u8 {
        self.hats.get(&id).copied().unwrap_or(HAT_CENTERED)
    }

    fn dpad_button(&mut self, id: GamepadId, bit: u8, pressed: bool) -> RawDeviceEvent {
        let mask = fold_dpad_button(self.hat_mask(id), bit, pressed);
        self.set_hat(id, mask)
    }

    fn dpad_axis(&mut self, id: GamepadId, value: f32, negative: u8, positive: u8) -> RawDeviceEvent {
        let mask = fold_dpad_axis(self.hat_mask(id), value, negative, positive);
        self.set_hat(id, mask)
    }

    fn convert(&mut self, id: GamepadId, event: EventType) -> RawDeviceEvent {
        match event {
            EventType::Connected => match self.connected.connect(id) {
                Some(which) => {
                    info!("Gamepad {} connected at raw index {}", id, which);
                    RawDeviceEvent::DeviceAdded { which }
                }
                None => {
                    debug!("Gamepad {} already enumerated", id);
                    RawDeviceEvent::Other
                }
            },
            EventType::Disconnected => {
                let which = self.connected.disconnect(id);
                self.hats.remove(&id);
                info!("Gamepad {} disconnected from raw index {}", id, which);
                RawDeviceEvent::DeviceRemoved { which }
            }
            EventType::AxisChanged(Axis::DPadX, value, _) => {
                self.dpad_axis(id, value, HAT_LEFT, HAT_RIGHT)
            }
            EventType::AxisChanged(Axis::DPadY, value, _) => {
                self.dpad_axis(id, value, HAT_DOWN, HAT_UP)
            }
            EventType::AxisChanged(axis, value, _) => match axis_index(axis) {
                Some(axis) => RawDeviceEvent::AxisMotion {
                    which: self.raw_index(id),
                    axis,
                    value: axis_to_raw(value),
                },
                None => RawDeviceEvent::Other,
            },
            EventType::ButtonPressed(button, _) => self.button(id, button, true),
            EventType::ButtonReleased(button, _) => self.button(id, button, false),
            _ => RawDeviceEvent::Other,
        }
    }

    fn button(&mut self, id: GamepadId, button: Button, pressed: bool) -> RawDeviceEvent {
        if let Some((_, bit)) = DPAD_BUTTONS.iter().find(|(b, _)| *b == button) {
            return self.dpad_button(id, *bit, pressed);
        }
        match button_index(button) {
            Some(button) => RawDeviceEvent::Button {
                which: self.raw_index(id),
                button,
                state: if pressed { BUTTON_PRESSED } else { BUTTON_RELEASED },
            },
            None => RawDeviceEvent::Other,
        }
    }

    fn prune_effects(&mut self) {
        let now = Instant::now();
        self.effects.retain(|(_, ends)| *ends > now);
    }
}

impl JoystickBackend for GilrsBackend {
    fn device_count(&self) -> usize {
        self.connected.len()
    }

    fn device_name(&self, index: i32) -> Result<String, BackendError> {
        self.with_gamepad(index, |gamepad| gamepad.name().to_string())
    }

    fn axis_count(&self, index: i32) -> Result<usize, BackendError> {
        self.with_gamepad(index, |gamepad| {
            AXES.iter()
                .filter(|axis| gamepad.axis_code(**axis).is_some())
                .count()
        })
    }

    fn button_count(&self, index: i32) -> Result<usize, BackendError> {
        self.with_gamepad(index, |gamepad| {
            BUTTONS
                .iter()
                .filter(|button| gamepad.button_code(**button).is_some())
                .count()
        })
    }

    fn hat_count(&self, index: i32) -> Result<usize, BackendError> {
        self.with_gamepad(index, |gamepad| {
            let has_dpad = DPAD_BUTTONS
                .iter()
                .any(|(button, _)| gamepad.button_code(*button).is_some())
                || gamepad.axis_code(Axis::DPadX).is_some()
                || gamepad.axis_code(Axis::DPadY).is_some();
            usize::from(has_dpad)
        })
    }

    fn next_event(&mut self) -> Option<RawDeviceEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        let Event { id, event, .. } = self.gilrs.next_event()?;
        Some(self.convert(id, event))
    }

    fn rumble(&mut self, index: i32, duration_ms: u32) -> Result<(), BackendError> {
        self.prune_effects();

        let id = self
            .gamepad_id(index)
            .ok_or(BackendError::InvalidDevice(index))?;
        let supported = self
            .gilrs
            .connected_gamepad(id)
            .map(|gamepad| gamepad.is_ff_supported())
            .unwrap_or(false);
        if !supported {
            debug!("Gamepad {} has no force feedback, skipping rumble", id);
            return Ok(());
        }

        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind: BaseEffectType::Strong {
                    magnitude: RUMBLE_MAGNITUDE,
                },
                scheduling: Replay {
                    after: Ticks::from_ms(0),
                    play_for: Ticks::from_ms(duration_ms),
                    with_delay: Ticks::from_ms(0),
                },
                envelope: Default::default(),
            })
            .gamepads(&[id])
            .finish(&mut self.gilrs)
            .map_err(|e| BackendError::HapticError(e.to_string()))?;
        effect
            .play()
            .map_err(|e| BackendError::HapticError(e.to_string()))?;

        // Dropping the effect stops it, keep it until the pulse is over
        let ends = Instant::now() + Duration::from_millis(u64::from(duration_ms));
        self.effects.push((effect, ends));
        Ok(())
    }

    fn release_all(&mut self) {
        info!(
            "Releasing {} gamepad(s) and {} rumble effect(s)",
            self.connected.len(),
            self.effects.len()
        );
        self.effects.clear();
        self.pending.clear();
        self.hats.clear();
        self.connected.clear();
    }
}

/// Connected devices in raw-index order.
///
/// New ids are appended; removing one shifts every later id down by one.
/// Unknown ids report raw index `-1`.
#[derive(Debug, Clone)]
pub struct RawIndexList<Id> {
    ids: Vec<Id>,
}

impl<Id> Default for RawIndexList<Id> {
    fn default() -> Self {
        Self { ids: Vec::new() }
    }
}

impl<Id: PartialEq + Copy> RawIndexList<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id`, returning its raw index, or `None` if it is already known.
    pub fn connect(&mut self, id: Id) -> Option<i32> {
        if self.ids.contains(&id) {
            return None;
        }
        self.ids.push(id);
        Some(self.ids.len() as i32 - 1)
    }

    /// Remove `id`, returning the raw index it held.
    pub fn disconnect(&mut self, id: Id) -> i32 {
        let which = self.position(id);
        self.ids.retain(|known| *known != id);
        which
    }

    pub fn position(&self, id: Id) -> i32 {
        self.ids
            .iter()
            .position(|known| *known == id)
            .map(|p| p as i32)
            .unwrap_or(-1)
    }

    pub fn get(&self, index: i32) -> Option<Id> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.ids.get(i))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Apply a d-pad button press or release to a hat bitmask.
pub fn fold_dpad_button(mask: u8, bit: u8, pressed: bool) -> u8 {
    if pressed {
        mask | bit
    } else {
        mask & !bit
    }
}

/// Apply a d-pad axis reading to a hat bitmask.
///
/// Both directions of the axis are cleared first, then at most one is set
/// when the reading is past the threshold.
pub fn fold_dpad_axis(mask: u8, value: f32, negative: u8, positive: u8) -> u8 {
    let cleared = mask & !(negative | positive);
    if value <= -DPAD_AXIS_THRESHOLD {
        cleared | negative
    } else if value >= DPAD_AXIS_THRESHOLD {
        cleared | positive
    } else {
        cleared
    }
}

fn axis_index(axis: Axis) -> Option<u8> {
    AXES.iter().position(|a| *a == axis).map(|p| p as u8)
}

fn button_index(button: Button) -> Option<u8> {
    BUTTONS.iter().position(|b| *b == button).map(|p| p as u8)
}

/// Expand a gilrs axis value back to the signed 16-bit range.
fn axis_to_raw(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * 32767.0).round() as i16
}
