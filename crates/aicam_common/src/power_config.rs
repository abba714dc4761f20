//! Persisted power-mode configuration.

use crate::types::PowerMode;
use serde::{Deserialize, Serialize};

/// Default idle window before falling back to low power.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 60_000;

/// Power-mode state persisted across sleep cycles and reboots.
///
/// `last_activity_ms` is device uptime in milliseconds, not wall clock;
/// it is only meaningful within a single boot but is persisted anyway so
/// the switch counter survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerModeConfig {
    pub current_mode: PowerMode,
    pub default_mode: PowerMode,
    pub idle_timeout_ms: u64,
    pub last_activity_ms: u64,
    pub mode_switch_count: u64,
}

impl Default for PowerModeConfig {
    fn default() -> Self {
        PowerModeConfig {
            current_mode: PowerMode::LowPower,
            default_mode: PowerMode::LowPower,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            last_activity_ms: 0,
            mode_switch_count: 0,
        }
    }
}
