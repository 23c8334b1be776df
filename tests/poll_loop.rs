use joypoll::config::PollSettings;
use joypoll::joystick::normalizer::normalize_axis;
use joypoll::joystick::scripted_backend::{ScriptedBackend, ScriptedDevice};
use joypoll::joystick::{
    AxisEvent, ButtonEvent, GamepadManager, HatEvent, JoystickEvent, JoystickId, JoystickRecord,
    ManagerError,
};
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};

fn next(events: &mut broadcast::Receiver<JoystickEvent>) -> Option<JoystickEvent> {
    events.try_recv().ok()
}

fn button(joystick: i32, button_id: u8, pressed: bool) -> JoystickEvent {
    JoystickEvent::ButtonChanged(ButtonEvent {
        button_id,
        joystick: JoystickId(joystick),
        pressed,
    })
}

#[tokio::test(start_paused = true)]
async fn first_drain_waits_for_warmup_then_publishes_in_order() {
    let backend = ScriptedBackend::new();
    backend.plug(ScriptedDevice::new("Pad", 4, 10, 1));
    backend.move_axis(0, 0, -16384);
    backend.press(0, 3, true);
    backend.move_hat(0, 0, 1);

    let manager = GamepadManager::spawn(Box::new(backend.clone()), None);
    let mut events = manager.subscribe();

    sleep(Duration::from_millis(499)).await;
    assert_eq!(backend.drains(), 0);
    assert_eq!(backend.pending(), 4);

    sleep(Duration::from_millis(6)).await;
    assert_eq!(backend.drains(), 1);
    assert_eq!(backend.pending(), 0);

    assert_eq!(
        next(&mut events),
        Some(JoystickEvent::DeviceListChanged {
            names: vec!["Pad".to_string()],
            count: 1,
        })
    );
    assert_eq!(
        next(&mut events),
        Some(JoystickEvent::AxisChanged(AxisEvent {
            axis_id: 0,
            joystick: JoystickId(0),
            value: normalize_axis(-16384),
        }))
    );
    assert_eq!(next(&mut events), Some(button(0, 3, true)));
    assert_eq!(
        next(&mut events),
        Some(JoystickEvent::HatChanged(HatEvent {
            hat_id: 0,
            angle: 1,
            joystick: JoystickId(0),
        }))
    );
    assert_eq!(next(&mut events), None);

    // re-armed with the steady interval
    sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.drains(), 2);

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn negative_interval_keeps_previous_one() {
    let backend = ScriptedBackend::new();
    let manager = GamepadManager::spawn(Box::new(backend.clone()), None);
    let handle = manager.handle();

    handle.set_poll_interval_ms(200);
    handle.set_poll_interval_ms(-5);

    sleep(Duration::from_millis(505)).await;
    assert_eq!(backend.drains(), 1);

    sleep(Duration::from_millis(185)).await;
    assert_eq!(backend.drains(), 1);

    sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.drains(), 2);

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn settings_control_warmup_and_interval() {
    let backend = ScriptedBackend::new();
    let settings = PollSettings {
        update_interval_ms: 10,
        warmup_delay_ms: 100,
        ..PollSettings::default()
    };
    let manager = GamepadManager::spawn(Box::new(backend.clone()), Some(settings));

    sleep(Duration::from_millis(105)).await;
    assert_eq!(backend.drains(), 1);

    sleep(Duration::from_millis(31)).await;
    assert_eq!(backend.drains(), 4);

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn events_arriving_between_ticks_wait_for_the_next_tick() {
    let backend = ScriptedBackend::new();
    backend.plug(ScriptedDevice::new("Pad", 2, 2, 0));
    let manager = GamepadManager::spawn(Box::new(backend.clone()), None);
    let mut events = manager.subscribe();

    sleep(Duration::from_millis(505)).await;
    assert!(matches!(
        next(&mut events),
        Some(JoystickEvent::DeviceListChanged { count: 1, .. })
    ));

    backend.press(0, 1, true);
    backend.press(0, 1, false);
    sleep(Duration::from_millis(20)).await;
    assert_eq!(next(&mut events), None);

    sleep(Duration::from_millis(30)).await;
    assert_eq!(next(&mut events), Some(button(0, 1, true)));
    assert_eq!(next(&mut events), Some(button(0, 1, false)));

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rumble_only_reaches_haptic_devices() {
    let backend = ScriptedBackend::new();
    backend.plug(ScriptedDevice::new("Wheel", 3, 20, 0).with_haptic());
    backend.plug(ScriptedDevice::new("Stick", 3, 4, 1));
    let manager = GamepadManager::spawn(Box::new(backend.clone()), None);
    let handle = manager.handle();

    handle.rumble(0, 300);
    handle.rumble(1, 300);
    handle.rumble(9, 300);
    sleep(Duration::from_millis(1)).await;

    assert_eq!(backend.rumbles(), vec![(0, 300)]);

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn queries_are_answered_by_the_poll_task() {
    let backend = ScriptedBackend::new();
    backend.plug(ScriptedDevice::new("Left", 2, 6, 1));
    backend.plug(ScriptedDevice::new("Right", 4, 8, 0));
    let manager = GamepadManager::spawn(Box::new(backend.clone()), None);
    let handle = manager.handle();

    assert_eq!(
        handle.joystick_list().await.unwrap(),
        vec!["Left".to_string(), "Right".to_string()]
    );

    sleep(Duration::from_millis(505)).await;

    // two connects seen, counter at 1: raw 1 -> 1-2=-1 -> 1
    assert_eq!(
        handle.device_info(1).await.unwrap(),
        JoystickRecord {
            id: JoystickId(1),
            num_axes: 4,
            num_buttons: 8,
            display_name: "Right".to_string(),
        }
    );

    let missing = handle.device_info(7).await.unwrap();
    assert_eq!(missing.num_axes, 0);
    assert_eq!(missing.num_buttons, 0);
    assert!(missing.display_name.is_empty());

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn hat_count_query_reports_zero_for_stale_index() {
    let backend = ScriptedBackend::new();
    backend.plug(ScriptedDevice::new("Stick", 3, 4, 2));
    backend.plug(ScriptedDevice::new("Pad", 6, 12, 0));
    let manager = GamepadManager::spawn(Box::new(backend.clone()), None);
    let handle = manager.handle();

    assert_eq!(handle.hat_count(0).await.unwrap(), 2);
    assert_eq!(handle.hat_count(1).await.unwrap(), 0);

    // the stick leaves, raw index 1 is gone
    backend.unplug(0);
    assert_eq!(handle.hat_count(1).await.unwrap(), 0);
    assert_eq!(handle.hat_count(-3).await.unwrap(), 0);

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn hot_plug_remaps_ids_by_connect_count() {
    let backend = ScriptedBackend::new();
    backend.plug(ScriptedDevice::new("A", 2, 2, 0));
    backend.plug(ScriptedDevice::new("B", 2, 2, 0));
    let manager = GamepadManager::spawn(Box::new(backend.clone()), None);
    let mut events = manager.subscribe();

    sleep(Duration::from_millis(505)).await;
    assert!(matches!(
        next(&mut events),
        Some(JoystickEvent::DeviceListChanged { count: 2, .. })
    ));
    assert!(matches!(
        next(&mut events),
        Some(JoystickEvent::DeviceListChanged { count: 2, .. })
    ));

    backend.press(0, 0, true);
    backend.press(1, 0, true);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(next(&mut events), Some(button(0, 0, true)));
    assert_eq!(next(&mut events), Some(button(1, 0, true)));

    // B slides down to raw index 0 and takes id 0 with the counter still at 1
    backend.unplug(0);
    backend.press(0, 0, false);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(
        next(&mut events),
        Some(JoystickEvent::DeviceListChanged {
            names: vec!["B".to_string()],
            count: 1,
        })
    );
    assert_eq!(next(&mut events), Some(button(0, 0, false)));

    manager.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_devices_and_stops_ticking() {
    let backend = ScriptedBackend::new();
    let manager = GamepadManager::spawn(Box::new(backend.clone()), None);
    let handle = manager.handle();

    sleep(Duration::from_millis(505)).await;
    assert_eq!(backend.drains(), 1);

    manager.shutdown().await.unwrap();
    assert!(backend.released());
    assert!(handle.is_stopped());

    sleep(Duration::from_millis(500)).await;
    assert_eq!(backend.drains(), 1);

    assert!(matches!(
        handle.joystick_list().await,
        Err(ManagerError::ChannelError(_))
    ));
}
