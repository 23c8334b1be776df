use color_eyre::{eyre::eyre, Result};
use joypoll::config::PollSettings;
use joypoll::joystick::{axis_name, button_name, GamepadManager, JoystickEvent, ManagerHandle};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup_errors()?;

    let settings = PollSettings::load().await?;
    setup_logging(&settings);

    info!("Initializing joystick manager");
    let manager = GamepadManager::spawn_gilrs(Some(settings))
        .map_err(|e| eyre!("Failed to start joystick manager: {}", e))?;

    let mut events = manager.subscribe();
    let handle = manager.handle();
    let mut known_devices = 0usize;

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                info!("Interrupt received");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event, &handle, &mut known_devices),
                Err(RecvError::Lagged(skipped)) => warn!("Log subscriber lagged, skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    manager.shutdown().await?;
    Ok(())
}

fn log_event(event: &JoystickEvent, handle: &ManagerHandle, known_devices: &mut usize) {
    match event {
        JoystickEvent::DeviceListChanged { names, count } => {
            info!("{} joystick(s): {:?}", count, names);
            // Newly plugged pads land on the last raw index
            if *count > *known_devices {
                handle.rumble(*count as i32 - 1, 200);
            }
            *known_devices = *count;
        }
        JoystickEvent::AxisChanged(axis) => debug!(
            "{} {}: {:.3}",
            axis.joystick,
            axis_name(axis.axis_id),
            axis.value
        ),
        JoystickEvent::ButtonChanged(button) => info!(
            "{} {} {}",
            button.joystick,
            button_name(button.button_id),
            if button.pressed { "pressed" } else { "released" }
        ),
        JoystickEvent::HatChanged(hat) => info!(
            "{} hat {}: {:#06b}",
            hat.joystick, hat.hat_id, hat.angle
        ),
    }
}

fn setup_errors() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging(settings: &PollSettings) {
    let level = settings.log_level.parse::<Level>().unwrap_or(Level::INFO);
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
