//! Power-mode timeout behavior and wakeup classification/dispatch,
//! exercised through the system controller with fake collaborators.

use aicamd::testing::{FakeClock, FakeRemoteTransport, FakeRtcDriver, FakeSleepPrimitive};
use aicamd::worker::CaptureEvent;
use aicamd::{ControllerDeps, SystemController, WakeupSourceSettings};
use aicam_common::{
    CaptureTrigger, MemoryConfigStore, PowerMode, PowerTrigger, SystemState, WakeupFlags,
    WakeupSource,
};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

struct Fixture {
    controller: Arc<SystemController>,
    clock: Arc<FakeClock>,
    store: Arc<MemoryConfigStore>,
    captures: Receiver<CaptureEvent>,
}

fn fixture() -> Fixture {
    let clock = Arc::new(FakeClock::new());
    let store = Arc::new(MemoryConfigStore::new());
    let (tx, rx) = aicamd::capture_channel();
    let controller = Arc::new(
        SystemController::new(ControllerDeps {
            store: store.clone(),
            clock: clock.clone(),
            rtc: Arc::new(FakeRtcDriver::new()),
            sleeper: Arc::new(FakeSleepPrimitive::new()),
            remote: Arc::new(FakeRemoteTransport::new()),
            capture_tx: tx,
        })
        .unwrap(),
    );
    Fixture {
        controller,
        clock,
        store,
        captures: rx,
    }
}

#[test]
fn test_idle_timeout_boundary_is_exact() {
    let f = fixture();
    let power = f.controller.power();
    power.set_mode(PowerMode::FullSpeed, PowerTrigger::Manual).unwrap();
    power.update_activity();

    f.clock.advance_ms(59_999);
    assert!(!power.check_timeout().unwrap());
    assert_eq!(power.mode(), PowerMode::FullSpeed);

    f.clock.advance_ms(1);
    assert!(power.check_timeout().unwrap());
    assert_eq!(power.mode(), PowerMode::LowPower);
}

#[test]
fn test_activity_defers_the_timeout() {
    let f = fixture();
    let power = f.controller.power();
    power.set_mode(PowerMode::FullSpeed, PowerTrigger::Manual).unwrap();

    f.clock.advance_ms(59_000);
    power.update_activity();
    f.clock.advance_ms(59_000);
    assert!(!power.check_timeout().unwrap());
    assert_eq!(power.mode(), PowerMode::FullSpeed);
}

#[test]
fn test_set_mode_is_idempotent_on_persistence() {
    let f = fixture();
    let power = f.controller.power();

    power.set_mode(PowerMode::FullSpeed, PowerTrigger::Manual).unwrap();
    assert_eq!(f.store.power_save_count(), 1);
    assert_eq!(power.switch_count(), 1);

    // Same mode again: no persist, no counter bump.
    power.set_mode(PowerMode::FullSpeed, PowerTrigger::Manual).unwrap();
    assert_eq!(f.store.power_save_count(), 1);
    assert_eq!(power.switch_count(), 1);

    power.set_mode(PowerMode::LowPower, PowerTrigger::Manual).unwrap();
    assert_eq!(f.store.power_save_count(), 2);
    assert_eq!(power.switch_count(), 2);
}

#[test]
fn test_simultaneous_flags_resolve_by_precedence() {
    let mut f = fixture();
    // RTC, PIR and network raised together: RTC wins.
    let flags = WakeupFlags::VALID
        | WakeupFlags::RTC_TIMING
        | WakeupFlags::PIR_RISING
        | WakeupFlags::NET;
    let source = f.controller.handle_wakeup(flags);
    assert_eq!(source, Some(WakeupSource::Rtc));
    assert_eq!(f.controller.system_state(), SystemState::Active);
    assert_eq!(
        f.captures.try_recv().unwrap().trigger,
        CaptureTrigger::RtcWakeup
    );
}

#[test]
fn test_remote_beats_button_beats_pir() {
    let mut f = fixture();
    let flags = WakeupFlags::VALID
        | WakeupFlags::WUFI
        | WakeupFlags::CONFIG_KEY
        | WakeupFlags::PIR_RISING;
    assert_eq!(f.controller.handle_wakeup(flags), Some(WakeupSource::Remote));
    assert_eq!(
        f.captures.try_recv().unwrap().trigger,
        CaptureTrigger::Remote
    );

    let flags = WakeupFlags::VALID | WakeupFlags::CONFIG_KEY | WakeupFlags::PIR_RISING;
    assert_eq!(f.controller.handle_wakeup(flags), Some(WakeupSource::Button));
}

#[test]
fn test_cold_boot_mask_dispatches_nothing() {
    let mut f = fixture();
    assert_eq!(f.controller.handle_wakeup(WakeupFlags::RTC_TIMING), None);
    assert_eq!(f.controller.system_state(), SystemState::Init);
    assert!(f.captures.try_recv().is_err());
    assert_eq!(f.controller.power().activity_count(), 0);
}

#[test]
fn test_unsupported_source_records_activity_but_drops_capture() {
    let mut f = fixture();
    // PIR is full-speed only by default; the device is in low power.
    let source = f
        .controller
        .handle_wakeup(WakeupFlags::VALID | WakeupFlags::PIR_RISING);
    assert_eq!(source, Some(WakeupSource::Pir));
    assert!(f.captures.try_recv().is_err());
    assert_eq!(f.controller.power().activity_count(), 1);
    assert_eq!(f.controller.system_state(), SystemState::Active);
}

#[test]
fn test_reconfigured_source_is_dispatched_in_low_power() {
    let mut f = fixture();
    f.controller.configure_wakeup_source(
        WakeupSource::Pir,
        WakeupSourceSettings {
            enabled: true,
            low_power_supported: true,
            full_speed_supported: true,
            debounce_ms: 100,
        },
    );
    f.controller
        .handle_wakeup(WakeupFlags::VALID | WakeupFlags::PIR_RISING);
    assert_eq!(f.captures.try_recv().unwrap().trigger, CaptureTrigger::Pir);
}

#[test]
fn test_mode_callback_reports_old_new_and_cause() {
    use std::sync::Mutex;
    let f = fixture();
    let seen: Arc<Mutex<Vec<(PowerMode, PowerMode, PowerTrigger)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let seen_in = seen.clone();
    f.controller
        .power()
        .set_mode_callback(Arc::new(move |old, new, cause| {
            seen_in.lock().unwrap().push((old, new, cause));
        }));

    f.controller
        .power()
        .set_mode(PowerMode::FullSpeed, PowerTrigger::AutoWakeup)
        .unwrap();
    f.clock.advance_ms(60_000);
    f.controller.power().check_timeout().unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (PowerMode::LowPower, PowerMode::FullSpeed, PowerTrigger::AutoWakeup),
            (PowerMode::FullSpeed, PowerMode::LowPower, PowerTrigger::Timeout),
        ]
    );
}
