//! Hardware-compatible bitmasks for the sleep-entry primitive.
//!
//! The wake companion chip consumes raw 32-bit masks; these newtypes
//! keep the exact bit layout while giving the rest of the code typed
//! constants instead of bare integers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Wakeup-cause / wakeup-arm flags, one bit per hardware source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WakeupFlags(u32);

impl WakeupFlags {
    pub const NONE: WakeupFlags = WakeupFlags(0);
    /// Set by hardware when the rest of the mask is meaningful; absent
    /// on cold boot / power-on reset.
    pub const VALID: WakeupFlags = WakeupFlags(1 << 0);
    pub const RTC_TIMING: WakeupFlags = WakeupFlags(1 << 1);
    pub const RTC_ALARM_A: WakeupFlags = WakeupFlags(1 << 2);
    pub const RTC_ALARM_B: WakeupFlags = WakeupFlags(1 << 3);
    /// Remote wakeup from the low-power radio (wake-on-frame).
    pub const WUFI: WakeupFlags = WakeupFlags(1 << 4);
    /// Config/boot button.
    pub const CONFIG_KEY: WakeupFlags = WakeupFlags(1 << 5);
    pub const PIR_HIGH: WakeupFlags = WakeupFlags(1 << 6);
    pub const PIR_LOW: WakeupFlags = WakeupFlags(1 << 7);
    pub const PIR_RISING: WakeupFlags = WakeupFlags(1 << 8);
    pub const PIR_FALLING: WakeupFlags = WakeupFlags(1 << 9);
    /// Network activity on the always-on interface.
    pub const NET: WakeupFlags = WakeupFlags(1 << 10);

    pub const PIR_ANY: WakeupFlags =
        WakeupFlags(Self::PIR_HIGH.0 | Self::PIR_LOW.0 | Self::PIR_RISING.0 | Self::PIR_FALLING.0);
    pub const RTC_ALARMS: WakeupFlags = WakeupFlags(Self::RTC_ALARM_A.0 | Self::RTC_ALARM_B.0);

    pub const fn from_bits(bits: u32) -> Self {
        WakeupFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// All bits of `other` present.
    pub const fn contains(self, other: WakeupFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// At least one bit of `other` present.
    pub const fn intersects(self, other: WakeupFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: WakeupFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for WakeupFlags {
    type Output = WakeupFlags;
    fn bitor(self, rhs: WakeupFlags) -> WakeupFlags {
        WakeupFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for WakeupFlags {
    fn bitor_assign(&mut self, rhs: WakeupFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for WakeupFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Power-rail switch bits held on through a sleep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PowerRails(u32);

impl PowerRails {
    pub const NONE: PowerRails = PowerRails(0);
    /// 3.3V sensor rail (PIR lives here).
    pub const RAIL_3V3: PowerRails = PowerRails(1 << 0);
    /// Always-on domain.
    pub const RAIL_AON: PowerRails = PowerRails(1 << 1);
    /// Main application processor rail.
    pub const RAIL_MAIN: PowerRails = PowerRails(1 << 2);
    /// WiFi module rail.
    pub const RAIL_WIFI: PowerRails = PowerRails(1 << 3);

    pub const fn from_bits(bits: u32) -> Self {
        PowerRails(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: PowerRails) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: PowerRails) {
        self.0 |= other.0;
    }
}

impl BitOr for PowerRails {
    type Output = PowerRails;
    fn bitor(self, rhs: PowerRails) -> PowerRails {
        PowerRails(self.0 | rhs.0)
    }
}

impl BitOrAssign for PowerRails {
    fn bitor_assign(&mut self, rhs: PowerRails) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for PowerRails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}
