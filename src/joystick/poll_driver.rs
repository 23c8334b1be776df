use chrono::Local;
use statum::{machine, state};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollSettings;

use super::backend::JoystickBackend;
use super::event_bus::{EventBus, JoystickEvent};
use super::normalizer::{joystick_record, normalize, DeviceList, JoystickRecord, Normalized};
use super::tracker::IdTracker;

// Requests served by the poll task between ticks
#[derive(Debug)]
pub enum PollCommand {
    SetInterval(i64),
    Rumble {
        device_index: i32,
        duration_ms: u32,
    },
    ListDevices(oneshot::Sender<DeviceList>),
    DeviceInfo {
        device_index: i32,
        reply: oneshot::Sender<JoystickRecord>,
    },
    HatCount {
        device_index: i32,
        reply: oneshot::Sender<usize>,
    },
}

// Outcome of one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub drained: usize,
    pub published: usize,
}

#[state]
#[derive(Debug, Clone)]
pub enum PollState {
    Idle,
    Draining,
}

#[machine]
#[derive(Debug)]
pub struct PollDriver<S: PollState> {
    // Sole owner of the hardware
    backend: Box<dyn JoystickBackend>,

    // Connect counter and id resolution
    tracker: IdTracker,

    // Where typed events go
    bus: EventBus,

    settings: PollSettings,

    // Completed drains since startup
    ticks: u64,
}

// Available in all states
impl<S: PollState> PollDriver<S> {
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn tracker(&self) -> &IdTracker {
        &self.tracker
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<JoystickEvent> {
        self.bus.subscribe()
    }

    // Warm-up delay before the first drain, steady interval afterwards
    pub fn next_delay(&self) -> Duration {
        if self.ticks == 0 {
            Duration::from_millis(self.settings.warmup_delay_ms)
        } else {
            Duration::from_millis(self.settings.update_interval_ms)
        }
    }
}

impl PollDriver<Idle> {
    pub fn create(backend: Box<dyn JoystickBackend>, settings: PollSettings, bus: EventBus) -> Self {
        info!(
            "Creating poll driver: warm-up {}ms, interval {}ms, {} device(s) present",
            settings.warmup_delay_ms,
            settings.update_interval_ms,
            backend.device_count()
        );
        Self::new(backend, IdTracker::new(), bus, settings, 0)
    }

    pub fn set_update_interval_ms(&mut self, interval_ms: i64) {
        if self.settings.set_update_interval_ms(interval_ms) {
            info!("Poll interval set to {}ms", self.settings.update_interval_ms);
        }
    }

    pub fn rumble(&mut self, device_index: i32, duration_ms: u32) {
        debug!("Rumble on raw index {} for {}ms", device_index, duration_ms);
        if let Err(e) = self.backend.rumble(device_index, duration_ms) {
            debug!("Rumble on raw index {} skipped: {}", device_index, e);
        }
    }

    pub fn device_list(&self) -> DeviceList {
        DeviceList::query(self.backend.as_ref())
    }

    pub fn device_info(&self, device_index: i32) -> JoystickRecord {
        joystick_record(device_index, &self.tracker, self.backend.as_ref())
    }

    // Zero when the device cannot be queried
    pub fn hat_count(&self, device_index: i32) -> usize {
        self.backend.hat_count(device_index).unwrap_or_else(|e| {
            debug!("Hat count unavailable for raw index {}: {}", device_index, e);
            0
        })
    }

    pub fn handle_command(&mut self, command: PollCommand) {
        match command {
            PollCommand::SetInterval(interval_ms) => self.set_update_interval_ms(interval_ms),
            PollCommand::Rumble {
                device_index,
                duration_ms,
            } => self.rumble(device_index, duration_ms),
            PollCommand::ListDevices(reply) => {
                if reply.send(self.device_list()).is_err() {
                    warn!("Device list requester went away");
                }
            }
            PollCommand::DeviceInfo {
                device_index,
                reply,
            } => {
                if reply.send(self.device_info(device_index)).is_err() {
                    warn!("Device info requester went away");
                }
            }
            PollCommand::HatCount {
                device_index,
                reply,
            } => {
                if reply.send(self.hat_count(device_index)).is_err() {
                    warn!("Hat count requester went away");
                }
            }
        }
    }

    // The scheduled tick elapsed
    pub fn begin_tick(self) -> PollDriver<Draining> {
        debug!("Tick {} elapsed, draining hardware queue", self.ticks + 1);
        self.transition()
    }

    // Give every device handle back to the hardware layer
    pub fn release(mut self) {
        info!("Releasing joystick handles after {} ticks", self.ticks);
        self.backend.release_all();
    }
}

impl PollDriver<Draining> {
    /// Drain the whole pending queue in FIFO order and publish each event.
    pub fn drain(mut self) -> (PollDriver<Idle>, TickReport) {
        let mut report = TickReport::default();

        while let Some(raw) = self.backend.next_event() {
            report.drained += 1;
            match normalize(&raw, &mut self.tracker, self.backend.as_ref()) {
                Some(normalized) => {
                    self.publish(normalized);
                    report.published += 1;
                }
                None => debug!("Skipping raw event: {:?}", raw),
            }
        }

        if report.drained > 0 {
            debug!(
                "Drained {} raw events, published {}",
                report.drained, report.published
            );
        }

        self.ticks += 1;
        (self.transition(), report)
    }

    fn publish(&self, normalized: Normalized) {
        let event = match normalized {
            Normalized::Connected { record, devices } => {
                info!(
                    "Joystick connected: {} \"{}\" ({} axes, {} buttons), {} device(s) total",
                    record.id, record.display_name, record.num_axes, record.num_buttons, devices.count
                );
                JoystickEvent::DeviceListChanged {
                    names: devices.names,
                    count: devices.count,
                }
            }
            Normalized::Disconnected { devices } => {
                info!("Joystick disconnected, {} device(s) left", devices.count);
                JoystickEvent::DeviceListChanged {
                    names: devices.names,
                    count: devices.count,
                }
            }
            Normalized::Axis(axis) => JoystickEvent::AxisChanged(axis),
            Normalized::Button(button) => {
                debug!(
                    "Button {} on {} {}",
                    button.button_id,
                    button.joystick,
                    if button.pressed { "pressed" } else { "released" }
                );
                JoystickEvent::ButtonChanged(button)
            }
            Normalized::Hat(hat) => JoystickEvent::HatChanged(hat),
        };
        self.bus.publish(event);
    }
}

enum Wake {
    Tick,
    Shutdown,
}

/// Run the poll loop until `cancel` fires, then release all handles.
///
/// Between ticks the task sleeps and serves commands; a drain always runs
/// to completion before the next command or cancellation is looked at.
pub async fn run_poll_loop(
    mut driver: PollDriver<Idle>,
    mut commands: mpsc::UnboundedReceiver<PollCommand>,
    cancel: CancellationToken,
) {
    info!("Entering joystick poll loop");

    let mut window_ticks = 0u64;
    let mut window_events = 0usize;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    loop {
        let sleep = tokio::time::sleep(driver.next_delay());
        tokio::pin!(sleep);

        let wake = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Wake::Shutdown,
                _ = &mut sleep => break Wake::Tick,
                Some(command) = commands.recv() => driver.handle_command(command),
            }
        };

        if let Wake::Shutdown = wake {
            info!("Poll loop cancelled");
            driver.release();
            return;
        }

        let (idle, report) = driver.begin_tick().drain();
        driver = idle;

        window_ticks += 1;
        window_events += report.drained;

        let now = Local::now();
        if now - last_stats_time > stats_interval {
            info!(
                "Poll stats: {} ticks, {} raw events in {} seconds",
                window_ticks,
                window_events,
                (now - last_stats_time).num_seconds()
            );
            window_ticks = 0;
            window_events = 0;
            last_stats_time = now;
        }
    }
}
