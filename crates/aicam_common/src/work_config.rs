//! Work-mode and capture-trigger configuration.
//!
//! The device captures either still images or a video stream, fired by
//! IO lines, a PIR sensor, remote commands, or RTC timers. Timer
//! triggers come in two flavors: a fixed repeat interval, or up to ten
//! absolute time-of-day nodes each with a weekday selector.

use crate::error::{AicamError, Result};
use crate::types::WorkMode;
use serde::{Deserialize, Serialize};

/// Maximum number of absolute time nodes per timer configuration.
pub const MAX_TIME_NODES: usize = 10;

/// Weekday bitmask covering Monday..Sunday (bits 0..6).
pub const WEEKDAYS_ALL: u8 = 0x7F;

const SECONDS_PER_DAY: u32 = 86_400;

/// Maps a config weekday selector to the scheduler's weekday bitmask.
/// 0 means every day; 1..=7 selects a single day (1 = Monday).
pub fn map_weekdays_to_bits(weekday: u8) -> u8 {
    if weekday == 0 {
        WEEKDAYS_ALL
    } else {
        1 << (weekday - 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerCaptureMode {
    #[default]
    Interval,
    Absolute,
}

/// One absolute firing point: a time of day plus a weekday selector
/// (0 = every day, 1..=7 = one day, Monday first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeNode {
    pub seconds_from_midnight: u32,
    pub weekdays: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerTriggerConfig {
    pub enabled: bool,
    pub capture_mode: TimerCaptureMode,
    /// Repeat period for `Interval` mode, in seconds.
    pub interval_sec: u32,
    /// Firing points for `Absolute` mode, at most [`MAX_TIME_NODES`].
    pub time_nodes: Vec<TimeNode>,
}

impl Default for TimerTriggerConfig {
    fn default() -> Self {
        TimerTriggerConfig {
            enabled: false,
            capture_mode: TimerCaptureMode::Interval,
            interval_sec: 3600,
            time_nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoEdge {
    #[default]
    Rising,
    Falling,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoTriggerConfig {
    pub enabled: bool,
    pub pin: u8,
    pub edge: IoEdge,
}

impl Default for IoTriggerConfig {
    fn default() -> Self {
        IoTriggerConfig {
            enabled: false,
            pin: 0,
            edge: IoEdge::Rising,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PirTriggerConfig {
    pub enabled: bool,
    /// 0..=100, higher is more sensitive.
    pub sensitivity: u8,
}

impl Default for PirTriggerConfig {
    fn default() -> Self {
        PirTriggerConfig {
            enabled: true,
            sensitivity: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTriggerConfig {
    pub enabled: bool,
}

impl Default for RemoteTriggerConfig {
    fn default() -> Self {
        RemoteTriggerConfig { enabled: true }
    }
}

/// Full capture configuration, persisted as one JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkModeConfig {
    pub work_mode: WorkMode,
    pub io_triggers: [IoTriggerConfig; 2],
    pub timer_trigger: TimerTriggerConfig,
    pub pir_trigger: PirTriggerConfig,
    pub remote_trigger: RemoteTriggerConfig,
}

impl WorkModeConfig {
    /// Rejects configs the scheduler cannot express.
    pub fn validate(&self) -> Result<()> {
        let nodes = &self.timer_trigger.time_nodes;
        if nodes.len() > MAX_TIME_NODES {
            return Err(AicamError::InvalidParam(format!(
                "too many time nodes: {} (max {MAX_TIME_NODES})",
                nodes.len()
            )));
        }
        for (i, node) in nodes.iter().enumerate() {
            if node.weekdays > 7 {
                return Err(AicamError::InvalidParam(format!(
                    "time node {i}: weekday {} out of range (0..=7)",
                    node.weekdays
                )));
            }
            if node.seconds_from_midnight >= SECONDS_PER_DAY {
                return Err(AicamError::InvalidParam(format!(
                    "time node {i}: {} seconds past midnight (max {})",
                    node.seconds_from_midnight,
                    SECONDS_PER_DAY - 1
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_zero_means_all_days() {
        assert_eq!(map_weekdays_to_bits(0), WEEKDAYS_ALL);
    }

    #[test]
    fn test_weekday_n_is_single_bit() {
        assert_eq!(map_weekdays_to_bits(1), 0b000_0001);
        assert_eq!(map_weekdays_to_bits(4), 0b000_1000);
        assert_eq!(map_weekdays_to_bits(7), 0b100_0000);
    }

    #[test]
    fn test_validate_rejects_too_many_nodes() {
        let mut config = WorkModeConfig::default();
        config.timer_trigger.time_nodes = vec![
            TimeNode {
                seconds_from_midnight: 0,
                weekdays: 0
            };
            MAX_TIME_NODES + 1
        ];
        assert!(matches!(
            config.validate(),
            Err(AicamError::InvalidParam(_))
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_node() {
        let mut config = WorkModeConfig::default();
        config.timer_trigger.time_nodes = vec![TimeNode {
            seconds_from_midnight: SECONDS_PER_DAY,
            weekdays: 0,
        }];
        assert!(config.validate().is_err());

        config.timer_trigger.time_nodes = vec![TimeNode {
            seconds_from_midnight: 0,
            weekdays: 8,
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_full_table() {
        let mut config = WorkModeConfig::default();
        config.timer_trigger.time_nodes = (0..MAX_TIME_NODES as u32)
            .map(|i| TimeNode {
                seconds_from_midnight: i * 3600,
                weekdays: (i % 8) as u8,
            })
            .collect();
        assert!(config.validate().is_ok());
    }
}
