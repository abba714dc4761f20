//! Power mode controller.
//!
//! The device idles in low power and switches to full speed while in
//! use. Every user-visible event calls `update_activity`; a periodic
//! poll calls `check_timeout` and drops back to low power once the idle
//! window passes. Mode changes persist immediately so a battery pull
//! cannot lose the switch counter.

use crate::collaborators::Clock;
use aicam_common::{ConfigStore, PowerMode, PowerModeConfig, PowerTrigger, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Invoked after a mode change with (old, new, cause).
pub type ModeChangeCallback = Arc<dyn Fn(PowerMode, PowerMode, PowerTrigger) + Send + Sync>;

pub struct PowerModeController {
    config: Mutex<PowerModeConfig>,
    store: Arc<dyn ConfigStore>,
    clock: Arc<dyn Clock>,
    callback: Mutex<Option<ModeChangeCallback>>,
    activity_count: AtomicU64,
}

impl PowerModeController {
    /// Loads the persisted config (writing defaults back when absent or
    /// corrupt) and stamps the current time as the last activity.
    pub fn load(store: Arc<dyn ConfigStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut config = store.load_power_mode_config()?;
        config.last_activity_ms = clock.now_ms();
        info!(mode = ?config.current_mode, "Power mode loaded");
        Ok(PowerModeController {
            config: Mutex::new(config),
            store,
            clock,
            callback: Mutex::new(None),
            activity_count: AtomicU64::new(0),
        })
    }

    pub fn set_mode_callback(&self, callback: ModeChangeCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }

    pub fn mode(&self) -> PowerMode {
        self.config.lock().unwrap().current_mode
    }

    pub fn config(&self) -> PowerModeConfig {
        self.config.lock().unwrap().clone()
    }

    pub fn switch_count(&self) -> u64 {
        self.config.lock().unwrap().mode_switch_count
    }

    pub fn activity_count(&self) -> u64 {
        self.activity_count.load(Ordering::Relaxed)
    }

    /// Switches power mode. Setting the current mode again is a no-op:
    /// nothing is persisted and no callback fires. Returns whether a
    /// switch happened.
    pub fn set_mode(&self, mode: PowerMode, trigger: PowerTrigger) -> Result<bool> {
        let (old, snapshot) = {
            let mut config = self.config.lock().unwrap();
            if config.current_mode == mode {
                return Ok(false);
            }
            let old = config.current_mode;
            config.current_mode = mode;
            config.last_activity_ms = self.clock.now_ms();
            config.mode_switch_count += 1;
            (old, config.clone())
        };

        // Persist is best effort; the in-memory switch stands either way.
        if let Err(e) = self.store.save_power_mode_config(&snapshot) {
            warn!(error = %e, "Failed to persist power mode");
        }
        info!(from = ?old, to = ?mode, cause = ?trigger, "Power mode changed");

        let callback = self.callback.lock().unwrap().clone();
        if let Some(cb) = callback {
            cb(old, mode, trigger);
        }
        Ok(true)
    }

    /// Records activity. Never changes the mode by itself.
    pub fn update_activity(&self) {
        self.config.lock().unwrap().last_activity_ms = self.clock.now_ms();
        self.activity_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Falls back to low power once idle time reaches the timeout.
    /// Only meaningful in full speed; returns whether a fallback ran.
    pub fn check_timeout(&self) -> Result<bool> {
        let idle_expired = {
            let config = self.config.lock().unwrap();
            if config.current_mode != PowerMode::FullSpeed {
                return Ok(false);
            }
            let idle = self.clock.now_ms().saturating_sub(config.last_activity_ms);
            idle >= config.idle_timeout_ms
        };
        if !idle_expired {
            return Ok(false);
        }
        debug!("Idle timeout reached, falling back to low power");
        self.set_mode(PowerMode::LowPower, PowerTrigger::Timeout)
    }
}
