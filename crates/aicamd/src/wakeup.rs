//! Wakeup source table and raw-flag classifier.
//!
//! The wake companion chip reports why the device woke as a raw bitmask.
//! `classify` maps that mask to a single logical source using a fixed
//! precedence; the per-source table then decides whether the event is
//! acted on in the current power mode or dropped.

use aicam_common::{PowerMode, WakeupFlags, WakeupSource};

/// Per-source wakeup policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeupSourceSettings {
    pub enabled: bool,
    pub low_power_supported: bool,
    pub full_speed_supported: bool,
    pub debounce_ms: u32,
}

/// Settings for all six sources, indexed by [`WakeupSource::index`].
#[derive(Debug, Clone)]
pub struct WakeupSourceTable {
    settings: [WakeupSourceSettings; WakeupSource::COUNT],
}

impl Default for WakeupSourceTable {
    /// Factory policy: IO and PIR only act at full speed (their
    /// handlers need the main pipeline up), button and RTC and remote
    /// work in both modes, unknown sources stay disabled.
    fn default() -> Self {
        let mut settings = [WakeupSourceSettings {
            enabled: false,
            low_power_supported: false,
            full_speed_supported: false,
            debounce_ms: 0,
        }; WakeupSource::COUNT];

        settings[WakeupSource::Io.index()] = WakeupSourceSettings {
            enabled: true,
            low_power_supported: false,
            full_speed_supported: true,
            debounce_ms: 50,
        };
        settings[WakeupSource::Rtc.index()] = WakeupSourceSettings {
            enabled: true,
            low_power_supported: true,
            full_speed_supported: true,
            debounce_ms: 0,
        };
        settings[WakeupSource::Pir.index()] = WakeupSourceSettings {
            enabled: true,
            low_power_supported: false,
            full_speed_supported: true,
            debounce_ms: 100,
        };
        settings[WakeupSource::Button.index()] = WakeupSourceSettings {
            enabled: true,
            low_power_supported: true,
            full_speed_supported: true,
            debounce_ms: 200,
        };
        settings[WakeupSource::Remote.index()] = WakeupSourceSettings {
            enabled: true,
            low_power_supported: true,
            full_speed_supported: true,
            debounce_ms: 0,
        };

        WakeupSourceTable { settings }
    }
}

impl WakeupSourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&mut self, source: WakeupSource, settings: WakeupSourceSettings) {
        self.settings[source.index()] = settings;
    }

    pub fn settings(&self, source: WakeupSource) -> WakeupSourceSettings {
        self.settings[source.index()]
    }

    /// Whether events from `source` are acted on in `mode`.
    pub fn is_supported(&self, source: WakeupSource, mode: PowerMode) -> bool {
        let s = self.settings[source.index()];
        s.enabled
            && match mode {
                PowerMode::LowPower => s.low_power_supported,
                PowerMode::FullSpeed => s.full_speed_supported,
            }
    }
}

/// Maps a raw wakeup mask to one logical source.
///
/// Returns `None` when the VALID bit is absent: a cold boot, not a
/// wakeup. With several cause bits set, precedence is fixed: RTC beats
/// wake-on-frame beats button beats PIR beats network activity.
/// Network activity is remote intent arriving over the always-on
/// interface, so it classifies as Remote. Anything else with a VALID
/// bit is Other.
pub fn classify(flags: WakeupFlags) -> Option<WakeupSource> {
    if !flags.contains(WakeupFlags::VALID) {
        return None;
    }
    if flags.intersects(WakeupFlags::RTC_TIMING | WakeupFlags::RTC_ALARMS) {
        Some(WakeupSource::Rtc)
    } else if flags.intersects(WakeupFlags::WUFI) {
        Some(WakeupSource::Remote)
    } else if flags.intersects(WakeupFlags::CONFIG_KEY) {
        Some(WakeupSource::Button)
    } else if flags.intersects(WakeupFlags::PIR_ANY) {
        Some(WakeupSource::Pir)
    } else if flags.intersects(WakeupFlags::NET) {
        Some(WakeupSource::Remote)
    } else {
        Some(WakeupSource::Other)
    }
}
