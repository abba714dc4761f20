//! Core state and event enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemState {
    Init,
    Active,
    Sleep,
    Shutdown,
    Error,
}

/// Global power mode. The device defaults to low power and only runs
/// full speed while someone is actively using it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMode {
    #[default]
    LowPower,
    FullSpeed,
}

/// What caused a power-mode switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTrigger {
    /// Explicit switch (web UI, operator).
    Manual,
    /// Switch performed while handling a wakeup.
    AutoWakeup,
    /// Idle timeout fell back to low power.
    Timeout,
}

/// Lifecycle state of a managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Initialized,
    Running,
    Error,
    Shutdown,
}

/// Hardware/protocol events capable of ending a sleep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeupSource {
    Io,
    Rtc,
    Pir,
    Button,
    Remote,
    Other,
}

impl WakeupSource {
    pub const COUNT: usize = 6;

    /// Index into per-source configuration tables.
    pub const fn index(self) -> usize {
        match self {
            WakeupSource::Io => 0,
            WakeupSource::Rtc => 1,
            WakeupSource::Pir => 2,
            WakeupSource::Button => 3,
            WakeupSource::Remote => 4,
            WakeupSource::Other => 5,
        }
    }

    pub const ALL: [WakeupSource; Self::COUNT] = [
        WakeupSource::Io,
        WakeupSource::Rtc,
        WakeupSource::Pir,
        WakeupSource::Button,
        WakeupSource::Remote,
        WakeupSource::Other,
    ];
}

impl fmt::Display for WakeupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WakeupSource::Io => "IO",
            WakeupSource::Rtc => "RTC",
            WakeupSource::Pir => "PIR",
            WakeupSource::Button => "BUTTON",
            WakeupSource::Remote => "REMOTE",
            WakeupSource::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// Why a capture was requested.
///
/// `Rtc` fires from a live timer on a running device; `RtcWakeup` is a
/// cold wake from sleep caused by the RTC. They route to the same
/// handler but downstream policy (sleep-after-task) differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTrigger {
    Io,
    RtcWakeup,
    Pir,
    Button,
    Remote,
    Other,
    Rtc,
}

impl From<WakeupSource> for CaptureTrigger {
    fn from(source: WakeupSource) -> Self {
        match source {
            WakeupSource::Io => CaptureTrigger::Io,
            WakeupSource::Rtc => CaptureTrigger::RtcWakeup,
            WakeupSource::Pir => CaptureTrigger::Pir,
            WakeupSource::Button => CaptureTrigger::Button,
            WakeupSource::Remote => CaptureTrigger::Remote,
            WakeupSource::Other => CaptureTrigger::Other,
        }
    }
}

/// Active capture discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkMode {
    #[default]
    Image,
    VideoStream,
}
