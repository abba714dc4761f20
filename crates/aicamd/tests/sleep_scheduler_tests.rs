//! Sleep-entry planning and RTC trigger scheduling, end to end through
//! the system controller with recording fakes.

use aicamd::testing::{FakeClock, FakeRemoteTransport, FakeRtcDriver, FakeSleepPrimitive};
use aicamd::{
    AlarmSlot, ControllerDeps, FireSpec, RepeatPolicy, RtcDriver, SystemController,
    WakeupSourceSettings,
};
use aicam_common::{
    MemoryConfigStore, PowerMode, PowerRails, PowerTrigger, SystemState, TimeNode,
    TimerCaptureMode, WakeupFlags, WakeupSource, WEEKDAYS_ALL,
};
use std::sync::Arc;

struct Fixture {
    controller: Arc<SystemController>,
    store: Arc<MemoryConfigStore>,
    rtc: Arc<FakeRtcDriver>,
    sleeper: Arc<FakeSleepPrimitive>,
    remote: Arc<FakeRemoteTransport>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryConfigStore::new());
    let rtc = Arc::new(FakeRtcDriver::new());
    let sleeper = Arc::new(FakeSleepPrimitive::new());
    let remote = Arc::new(FakeRemoteTransport::new());
    let (tx, _rx) = aicamd::capture_channel();
    let controller = Arc::new(
        SystemController::new(ControllerDeps {
            store: store.clone(),
            clock: Arc::new(FakeClock::new()),
            rtc: rtc.clone(),
            sleeper: sleeper.clone(),
            remote: remote.clone(),
            capture_tx: tx,
        })
        .unwrap(),
    );
    Fixture {
        controller,
        store,
        rtc,
        sleeper,
        remote,
    }
}

fn pir_low_power(f: &Fixture) {
    f.controller.configure_wakeup_source(
        WakeupSource::Pir,
        WakeupSourceSettings {
            enabled: true,
            low_power_supported: true,
            full_speed_supported: true,
            debounce_ms: 100,
        },
    );
}

#[test]
fn test_low_power_sleep_arms_pir_and_its_rail() {
    let f = fixture();
    pir_low_power(&f);

    f.controller.enter_sleep(0).unwrap();

    assert_eq!(f.controller.system_state(), SystemState::Sleep);
    let call = f.sleeper.last_call().unwrap();
    assert!(call
        .flags
        .contains(WakeupFlags::RTC_TIMING | WakeupFlags::CONFIG_KEY | WakeupFlags::PIR_RISING));
    assert!(call.rails.contains(PowerRails::RAIL_3V3));
    assert!(!call.rails.contains(PowerRails::RAIL_MAIN));

    // Both configs were persisted on the way down.
    assert!(f.store.power_save_count() >= 1);
    assert!(f.store.work_save_count() >= 1);
}

#[test]
fn test_disabled_remote_trigger_sleeps_without_wufi_or_handoff() {
    let f = fixture();
    pir_low_power(&f);
    let mut config = f.controller.work_config();
    config.remote_trigger.enabled = false;
    f.controller.set_work_config(config).unwrap();

    f.controller.enter_sleep(0).unwrap();

    let call = f.sleeper.last_call().unwrap();
    assert!(!call.flags.contains(WakeupFlags::WUFI));
    assert!(!call.rails.contains(PowerRails::RAIL_WIFI));
    assert!(f.remote.log().is_empty());
    // PIR arming is independent of the remote trigger.
    assert!(call.flags.contains(WakeupFlags::PIR_RISING));
    assert!(call.rails.contains(PowerRails::RAIL_3V3));
}

#[test]
fn test_remote_handoff_failure_sleeps_without_wufi() {
    let f = fixture();
    f.remote.fail_enable();

    f.controller.enter_sleep(0).unwrap();

    let call = f.sleeper.last_call().unwrap();
    assert!(!call.flags.contains(WakeupFlags::WUFI));
    assert!(!call.rails.contains(PowerRails::RAIL_WIFI));
    // The sleep itself still went through.
    assert_eq!(f.controller.system_state(), SystemState::Sleep);
}

#[test]
fn test_successful_handoff_arms_wufi_and_wifi_rail() {
    let f = fixture();
    f.controller.enter_sleep(0).unwrap();

    let call = f.sleeper.last_call().unwrap();
    assert!(call.flags.contains(WakeupFlags::WUFI));
    assert!(call.rails.contains(PowerRails::RAIL_3V3 | PowerRails::RAIL_WIFI));
    assert_eq!(
        f.remote.log(),
        vec!["stop_primary", "switch_to_low_power", "enable_remote_wakeup"]
    );
}

#[test]
fn test_full_speed_sleep_keeps_baseline_rails() {
    let f = fixture();
    f.controller
        .power()
        .set_mode(PowerMode::FullSpeed, PowerTrigger::Manual)
        .unwrap();

    f.controller.enter_sleep(0).unwrap();

    let call = f.sleeper.last_call().unwrap();
    assert!(call
        .rails
        .contains(PowerRails::RAIL_3V3 | PowerRails::RAIL_AON | PowerRails::RAIL_MAIN));
    // No transport handoff at full speed.
    assert!(f.remote.log().is_empty());
    assert!(call.flags.contains(WakeupFlags::WUFI));
}

#[test]
fn test_sleep_duration_comes_from_interval_timer_when_unspecified() {
    let f = fixture();
    let mut config = f.controller.work_config();
    config.timer_trigger.enabled = true;
    config.timer_trigger.capture_mode = TimerCaptureMode::Interval;
    config.timer_trigger.interval_sec = 900;
    f.controller.set_work_config(config).unwrap();

    f.controller.enter_sleep(0).unwrap();
    assert_eq!(f.sleeper.last_call().unwrap().duration_sec, 900);

    // An explicit request wins over the timer period.
    f.controller.enter_sleep(120).unwrap();
    assert_eq!(f.sleeper.last_call().unwrap().duration_sec, 120);
}

#[test]
fn test_alarm_slots_resolved_and_armed() {
    let f = fixture();
    // 2024-01-01 08:30:15 UTC, a Monday; slot B empty.
    f.rtc.set_next_fire(AlarmSlot::A, Some(1_704_097_815));

    f.controller.enter_sleep(0).unwrap();

    let call = f.sleeper.last_call().unwrap();
    let alarm_a = call.alarm_a.unwrap();
    assert_eq!(alarm_a.weekday, 1);
    assert_eq!(alarm_a.hour, 8);
    assert_eq!(alarm_a.minute, 30);
    assert_eq!(alarm_a.second, 15);
    assert!(call.alarm_b.is_none());
    assert!(call.flags.contains(WakeupFlags::RTC_ALARM_A));
    assert!(!call.flags.contains(WakeupFlags::RTC_ALARM_B));
}

#[test]
fn test_sleep_primitive_failure_propagates() {
    let f = fixture();
    f.sleeper.fail_next(true);
    assert!(f.controller.enter_sleep(0).is_err());
}

#[test]
fn test_interval_config_registers_single_named_task() {
    let f = fixture();
    f.rtc.set_now(1_700_007_777);

    let mut config = f.controller.work_config();
    config.timer_trigger.enabled = true;
    config.timer_trigger.capture_mode = TimerCaptureMode::Interval;
    config.timer_trigger.interval_sec = 300;
    f.controller.set_work_config(config).unwrap();

    let sched = f.controller.scheduler();
    assert_eq!(sched.active_task_name().as_deref(), Some("timer_capture_7777"));
    assert_eq!(sched.active_task_count(), 1);
    assert_eq!(f.rtc.task_count("timer_capture_7777"), 1);
}

#[test]
fn test_absolute_config_registers_per_node_with_weekday_mapping() {
    let f = fixture();
    let mut config = f.controller.work_config();
    config.timer_trigger.enabled = true;
    config.timer_trigger.capture_mode = TimerCaptureMode::Absolute;
    config.timer_trigger.time_nodes = vec![
        TimeNode { seconds_from_midnight: 7 * 3600, weekdays: 0 },
        TimeNode { seconds_from_midnight: 21 * 3600, weekdays: 3 },
    ];
    f.controller.set_work_config(config).unwrap();

    let sched = f.controller.scheduler();
    assert_eq!(sched.active_task_count(), 2);
    let name = sched.active_task_name().unwrap();
    let specs = f.rtc.specs_for(&name);
    assert_eq!(specs.len(), 2);
    assert_eq!(
        specs[0],
        FireSpec::Calendar {
            seconds_from_midnight: 7 * 3600,
            weekdays: WEEKDAYS_ALL,
            repeat: RepeatPolicy::Daily,
        }
    );
    assert_eq!(
        specs[1],
        FireSpec::Calendar {
            seconds_from_midnight: 21 * 3600,
            weekdays: 0b100, // Wednesday
            repeat: RepeatPolicy::Weekly,
        }
    );
}

#[test]
fn test_scheduler_slot_tracks_registration_invariant() {
    let f = fixture();
    let sched = f.controller.scheduler();
    assert_eq!(sched.active_task_name(), None);
    assert_eq!(sched.active_task_count(), 0);

    let mut config = f.controller.work_config();
    config.timer_trigger.enabled = true;
    config.timer_trigger.interval_sec = 60;
    f.controller.set_work_config(config.clone()).unwrap();
    assert!(sched.active_task_name().is_some());

    config.timer_trigger.enabled = false;
    f.controller.set_work_config(config).unwrap();
    assert_eq!(sched.active_task_name(), None);
    assert_eq!(sched.active_task_count(), 0);
}

#[test]
fn test_generated_name_collision_replaces_unrelated_task() {
    let f = fixture();
    f.rtc.set_now(4_242);
    f.rtc
        .register_task(
            "timer_capture_4242",
            FireSpec::Interval { secs: 5 },
            Arc::new(|| {}),
        )
        .unwrap();

    let mut config = f.controller.work_config();
    config.timer_trigger.enabled = true;
    config.timer_trigger.interval_sec = 60;
    f.controller.set_work_config(config).unwrap();

    // Last writer wins under the shared name.
    assert_eq!(f.rtc.task_count("timer_capture_4242"), 1);
    assert_eq!(f.controller.scheduler().active_task_count(), 1);
}
