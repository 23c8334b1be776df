//! Typed publish/subscribe boundary
//!
//! Every subscriber gets its own [`broadcast::Receiver`] and sees all events
//! in publish order. A subscriber that falls more than the channel capacity
//! behind loses the oldest events and gets a `Lagged` error on its next
//! receive.

use tokio::sync::broadcast;
use tracing::debug;

use super::normalizer::{AxisEvent, ButtonEvent, HatEvent};

pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Events published by the poll loop
#[derive(Debug, Clone, PartialEq)]
pub enum JoystickEvent {
    /// Sent on every connect and disconnect
    DeviceListChanged { names: Vec<String>, count: usize },
    AxisChanged(AxisEvent),
    ButtonChanged(ButtonEvent),
    HatChanged(HatEvent),
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<JoystickEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JoystickEvent> {
        debug!("New subscriber to joystick events");
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish one event. Having no subscribers is not an error.
    pub fn publish(&self, event: JoystickEvent) {
        if let Err(e) = self.sender.send(event) {
            debug!("Dropped event without subscribers: {:?}", e.0);
        }
    }
}
