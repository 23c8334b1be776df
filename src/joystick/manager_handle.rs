//! Manager Handle - lifecycle and public API of the joystick subsystem
//!
//! [`GamepadManager::spawn`] moves a backend into a dedicated poll task and
//! returns the owner of that task. Cloneable [`ManagerHandle`]s talk to the
//! task through a command channel, so every hardware call still happens on
//! the task that owns the backend.
//!
//! ```text
//! ManagerHandle ─[PollCommand]→ poll task ─[JoystickEvent]→ subscribers
//!                (mpsc)          owns backend  (broadcast)
//! ```

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PollSettings;

use super::backend::{BackendError, JoystickBackend};
use super::event_bus::{EventBus, JoystickEvent};
use super::gilrs_backend::GilrsBackend;
use super::normalizer::{DeviceList, JoystickRecord};
use super::poll_driver::{run_poll_loop, PollCommand, PollDriver};

/// Errors surfaced by the manager
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The hardware subsystem could not be brought up; there is no
    /// degraded mode.
    #[error("Initialization error: {0}")]
    InitializationError(#[from] BackendError),

    /// The poll task is gone
    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Poll task failed: {0}")]
    TaskError(String),
}

/// Cheap, cloneable access to a running manager
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    commands: mpsc::UnboundedSender<PollCommand>,
    bus: EventBus,
    cancel: CancellationToken,
}

impl ManagerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<JoystickEvent> {
        self.bus.subscribe()
    }

    /// Change the steady-state poll interval. Negative values are ignored.
    pub fn set_poll_interval_ms(&self, interval_ms: i64) {
        if interval_ms < 0 {
            debug!("Ignoring negative poll interval {}ms", interval_ms);
            return;
        }
        self.send(PollCommand::SetInterval(interval_ms));
    }

    /// Fire a rumble pulse on the device at `device_index`. Fire-and-forget.
    pub fn rumble(&self, device_index: i32, duration_ms: u32) {
        self.send(PollCommand::Rumble {
            device_index,
            duration_ms,
        });
    }

    /// Names of all connected devices in raw-index order
    pub async fn joystick_list(&self) -> Result<Vec<String>, ManagerError> {
        Ok(self.device_list().await?.names)
    }

    pub async fn device_list(&self) -> Result<DeviceList, ManagerError> {
        let (reply, response) = oneshot::channel();
        self.try_send(PollCommand::ListDevices(reply))?;
        response
            .await
            .map_err(|e| ManagerError::ChannelError(e.to_string()))
    }

    /// Snapshot of the device currently at `device_index`
    pub async fn device_info(&self, device_index: i32) -> Result<JoystickRecord, ManagerError> {
        let (reply, response) = oneshot::channel();
        self.try_send(PollCommand::DeviceInfo {
            device_index,
            reply,
        })?;
        response
            .await
            .map_err(|e| ManagerError::ChannelError(e.to_string()))
    }

    /// Number of hats on the device at `device_index`, zero if it cannot be
    /// queried
    pub async fn hat_count(&self, device_index: i32) -> Result<usize, ManagerError> {
        let (reply, response) = oneshot::channel();
        self.try_send(PollCommand::HatCount {
            device_index,
            reply,
        })?;
        response
            .await
            .map_err(|e| ManagerError::ChannelError(e.to_string()))
    }

    /// Ask the poll task to stop after the current tick
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn send(&self, command: PollCommand) {
        if let Err(e) = self.try_send(command) {
            warn!("Dropping command: {}", e);
        }
    }

    fn try_send(&self, command: PollCommand) -> Result<(), ManagerError> {
        self.commands
            .send(command)
            .map_err(|e| ManagerError::ChannelError(format!("poll task stopped: {:?}", e.0)))
    }
}

/// Owner of the poll task
#[derive(Debug)]
pub struct GamepadManager {
    handle: ManagerHandle,
    task: JoinHandle<()>,
}

impl GamepadManager {
    /// Spawn the poll loop on top of gilrs.
    ///
    /// # Errors
    ///
    /// [`ManagerError::InitializationError`] if gilrs cannot be initialized.
    pub fn spawn_gilrs(settings: Option<PollSettings>) -> Result<Self, ManagerError> {
        let backend = GilrsBackend::new()?;
        Ok(Self::spawn(Box::new(backend), settings))
    }

    /// Spawn the poll loop on top of any backend. Must be called from
    /// within a tokio runtime.
    pub fn spawn(backend: Box<dyn JoystickBackend>, settings: Option<PollSettings>) -> Self {
        let settings = settings.unwrap_or_default();
        info!("Spawning joystick manager with settings: {:?}", settings);

        let bus = EventBus::new(settings.bus_capacity);
        let (commands, command_receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let driver = PollDriver::create(backend, settings, bus.clone());
        let task = tokio::spawn(run_poll_loop(driver, command_receiver, cancel.clone()));
        debug!("Poll task spawned: {:?}", task);

        Self {
            handle: ManagerHandle {
                commands,
                bus,
                cancel,
            },
            task,
        }
    }

    pub fn handle(&self) -> ManagerHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JoystickEvent> {
        self.handle.subscribe()
    }

    /// Stop scheduling ticks and wait until every device handle is released.
    pub async fn shutdown(self) -> Result<(), ManagerError> {
        info!("Shutting down joystick manager");
        self.handle.stop();
        self.task.await.map_err(|e| {
            error!("Poll task ended abnormally: {}", e);
            ManagerError::TaskError(e.to_string())
        })
    }
}
