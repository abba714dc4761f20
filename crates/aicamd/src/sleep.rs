//! Sleep planning.
//!
//! Before handing control to the sleep hardware the orchestrator has
//! to decide three things: which wakeup sources get armed, which power
//! rails stay on for them, and how long the timed sleep runs. All
//! three are pure functions of the power mode, the wakeup source
//! table, the work config and the RTC alarm lookahead, so they live
//! here as a plan builder the controller calls right before the
//! one-way door.

use crate::collaborators::{AlarmSlot, RemoteWakeupTransport, RtcAlarm, RtcDriver};
use crate::wakeup::WakeupSourceTable;
use aicam_common::{
    PowerMode, PowerRails, TimerCaptureMode, WakeupFlags, WakeupSource, WorkModeConfig,
};
use chrono::{DateTime, Datelike, Timelike};
use tracing::{debug, warn};

/// Everything the sleep primitive needs, computed up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepPlan {
    pub flags: WakeupFlags,
    pub rails: PowerRails,
    pub sleep_sec: u32,
    pub alarm_a: Option<RtcAlarm>,
    pub alarm_b: Option<RtcAlarm>,
}

/// Builds the sleep plan for the current device state.
///
/// The remote handoff (stop primary transport, switch to the low-power
/// radio, enable wake-on-frame) runs only in low power, and only when
/// the work config enables the remote trigger and the source table
/// marks the remote source low-power-capable; any step failing leaves
/// the remote bit unarmed and sleep proceeds without it.
pub fn build_sleep_plan(
    mode: PowerMode,
    table: &WakeupSourceTable,
    work: &WorkModeConfig,
    requested_sec: u32,
    remote: &dyn RemoteWakeupTransport,
    rtc: &dyn RtcDriver,
) -> SleepPlan {
    let mut flags = WakeupFlags::RTC_TIMING | WakeupFlags::CONFIG_KEY;

    let pir = table.settings(WakeupSource::Pir);
    let remote_settings = table.settings(WakeupSource::Remote);
    let rtc_enabled = table.settings(WakeupSource::Rtc).enabled;

    match mode {
        PowerMode::LowPower => {
            if pir.enabled && pir.low_power_supported {
                flags |= WakeupFlags::PIR_RISING;
            }
            if rtc_enabled {
                flags |= WakeupFlags::RTC_ALARM_A;
            }
            if work.remote_trigger.enabled
                && remote_settings.enabled
                && remote_settings.low_power_supported
            {
                match remote_handoff(remote) {
                    Ok(()) => flags |= WakeupFlags::WUFI,
                    Err(step) => {
                        warn!(step, "Remote handoff failed, sleeping without remote wakeup")
                    }
                }
            }
        }
        PowerMode::FullSpeed => {
            flags |= WakeupFlags::RTC_ALARM_A;
            if pir.enabled && pir.full_speed_supported {
                flags |= WakeupFlags::PIR_RISING;
            }
            if remote_settings.enabled && remote_settings.full_speed_supported {
                flags |= WakeupFlags::WUFI;
            }
        }
    }

    let alarm_a = rtc.next_fire_time(AlarmSlot::A).and_then(alarm_from_timestamp);
    let alarm_b = rtc.next_fire_time(AlarmSlot::B).and_then(alarm_from_timestamp);
    if alarm_a.is_some() {
        flags |= WakeupFlags::RTC_ALARM_A;
    }
    if alarm_b.is_some() {
        flags |= WakeupFlags::RTC_ALARM_B;
    }

    let rails = rails_for(mode, flags);
    let sleep_sec = resolve_sleep_sec(requested_sec, work);
    debug!(%flags, %rails, sleep_sec, "Sleep plan built");

    SleepPlan {
        flags,
        rails,
        sleep_sec,
        alarm_a,
        alarm_b,
    }
}

fn remote_handoff(remote: &dyn RemoteWakeupTransport) -> std::result::Result<(), &'static str> {
    remote.stop_primary().map_err(|_| "stop_primary")?;
    remote
        .switch_to_low_power()
        .map_err(|_| "switch_to_low_power")?;
    remote
        .enable_remote_wakeup()
        .map_err(|_| "enable_remote_wakeup")?;
    Ok(())
}

/// Rails follow the armed sources: low power keeps everything off
/// except what an armed source needs; full speed keeps the baseline up.
fn rails_for(mode: PowerMode, flags: WakeupFlags) -> PowerRails {
    let mut rails = match mode {
        PowerMode::LowPower => PowerRails::NONE,
        PowerMode::FullSpeed => {
            PowerRails::RAIL_3V3 | PowerRails::RAIL_AON | PowerRails::RAIL_MAIN
        }
    };
    if flags.contains(WakeupFlags::PIR_RISING) {
        rails |= PowerRails::RAIL_3V3;
    }
    if flags.contains(WakeupFlags::WUFI) {
        rails |= PowerRails::RAIL_3V3 | PowerRails::RAIL_WIFI;
    }
    rails
}

/// Caller-requested duration wins; otherwise an enabled interval timer
/// supplies its period; otherwise the timed sleep is off.
fn resolve_sleep_sec(requested: u32, work: &WorkModeConfig) -> u32 {
    if requested > 0 {
        return requested;
    }
    let timer = &work.timer_trigger;
    if timer.enabled && timer.capture_mode == TimerCaptureMode::Interval {
        return timer.interval_sec;
    }
    0
}

/// Splits a Unix timestamp into the calendar alarm fields the sleep
/// hardware wants (UTC; weekday 1 = Monday).
pub fn alarm_from_timestamp(ts: i64) -> Option<RtcAlarm> {
    let dt = DateTime::from_timestamp(ts, 0)?;
    Some(RtcAlarm {
        weekday: dt.weekday().number_from_monday() as u8,
        hour: dt.hour() as u8,
        minute: dt.minute() as u8,
        second: dt.second() as u8,
    })
}
