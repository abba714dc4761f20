//! System controller.
//!
//! The one aggregate the rest of the daemon talks to: system state
//! machine, power controller, work-mode configuration, wakeup table,
//! timer scheduler and the sleep path. Built once by the composition
//! root and shared behind an `Arc`; all mutation goes through methods
//! here or on the owned components.

use crate::collaborators::{Clock, RemoteWakeupTransport, RtcDriver, SleepPrimitive};
use crate::power::PowerModeController;
use crate::scheduler::TriggerScheduler;
use crate::sleep::build_sleep_plan;
use crate::wakeup::{classify, WakeupSourceSettings, WakeupSourceTable};
use crate::worker::{queue_capture, CaptureEvent};
use aicam_common::{
    CaptureTrigger, ConfigStore, PowerMode, Result, SystemState, WakeupFlags, WakeupSource,
    WorkMode, WorkModeConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Invoked after a system-state transition with (old, new).
pub type StateChangeCallback = Arc<dyn Fn(SystemState, SystemState) + Send + Sync>;
/// Invoked after the work mode itself changes with (old, new).
pub type WorkModeChangeCallback = Arc<dyn Fn(WorkMode, WorkMode) + Send + Sync>;

struct StateInner {
    state: SystemState,
    previous: SystemState,
    change_count: u64,
    last_change_ms: u64,
}

/// Everything the controller needs from the outside.
pub struct ControllerDeps {
    pub store: Arc<dyn ConfigStore>,
    pub clock: Arc<dyn Clock>,
    pub rtc: Arc<dyn RtcDriver>,
    pub sleeper: Arc<dyn SleepPrimitive>,
    pub remote: Arc<dyn RemoteWakeupTransport>,
    pub capture_tx: mpsc::Sender<CaptureEvent>,
}

pub struct SystemController {
    state: Mutex<StateInner>,
    state_callback: Mutex<Option<StateChangeCallback>>,
    work_callback: Mutex<Option<WorkModeChangeCallback>>,
    power: Arc<PowerModeController>,
    work_config: Mutex<WorkModeConfig>,
    wakeup_table: Mutex<WakeupSourceTable>,
    scheduler: TriggerScheduler,
    store: Arc<dyn ConfigStore>,
    clock: Arc<dyn Clock>,
    rtc: Arc<dyn RtcDriver>,
    sleeper: Arc<dyn SleepPrimitive>,
    remote: Arc<dyn RemoteWakeupTransport>,
    capture_tx: mpsc::Sender<CaptureEvent>,
    stored_wakeup: Mutex<Option<WakeupFlags>>,
    sleep_pending: AtomicBool,
}

impl SystemController {
    /// Loads persisted configs and assembles the aggregate. The timer
    /// schedule is not applied here; call [`apply_boot_config`] once
    /// the registry has the messaging services up.
    ///
    /// [`apply_boot_config`]: SystemController::apply_boot_config
    pub fn new(deps: ControllerDeps) -> Result<Self> {
        let power = Arc::new(PowerModeController::load(
            deps.store.clone(),
            deps.clock.clone(),
        )?);
        let work_config = deps.store.load_work_mode_config()?;
        let scheduler = TriggerScheduler::new(deps.rtc.clone(), deps.capture_tx.clone());
        let now = deps.clock.now_ms();

        Ok(SystemController {
            state: Mutex::new(StateInner {
                state: SystemState::Init,
                previous: SystemState::Init,
                change_count: 0,
                last_change_ms: now,
            }),
            state_callback: Mutex::new(None),
            work_callback: Mutex::new(None),
            power,
            work_config: Mutex::new(work_config),
            wakeup_table: Mutex::new(WakeupSourceTable::default()),
            scheduler,
            store: deps.store,
            clock: deps.clock,
            rtc: deps.rtc,
            sleeper: deps.sleeper,
            remote: deps.remote,
            capture_tx: deps.capture_tx,
            stored_wakeup: Mutex::new(None),
            sleep_pending: AtomicBool::new(false),
        })
    }

    // --- system state -------------------------------------------------

    pub fn system_state(&self) -> SystemState {
        self.state.lock().unwrap().state
    }

    pub fn previous_state(&self) -> SystemState {
        self.state.lock().unwrap().previous
    }

    pub fn state_change_count(&self) -> u64 {
        self.state.lock().unwrap().change_count
    }

    pub fn last_state_change_ms(&self) -> u64 {
        self.state.lock().unwrap().last_change_ms
    }

    pub fn set_state_callback(&self, callback: StateChangeCallback) {
        *self.state_callback.lock().unwrap() = Some(callback);
    }

    pub fn set_work_mode_callback(&self, callback: WorkModeChangeCallback) {
        *self.work_callback.lock().unwrap() = Some(callback);
    }

    /// Moves the system state machine. Re-entering the current state
    /// is a no-op.
    pub fn set_system_state(&self, new: SystemState) {
        let old = {
            let mut inner = self.state.lock().unwrap();
            if inner.state == new {
                return;
            }
            let old = inner.state;
            inner.previous = old;
            inner.state = new;
            inner.change_count += 1;
            inner.last_change_ms = self.clock.now_ms();
            old
        };
        info!(from = ?old, to = ?new, "System state changed");
        let callback = self.state_callback.lock().unwrap().clone();
        if let Some(cb) = callback {
            cb(old, new);
        }
    }

    pub fn power(&self) -> &Arc<PowerModeController> {
        &self.power
    }

    pub fn scheduler(&self) -> &TriggerScheduler {
        &self.scheduler
    }

    // --- work-mode configuration --------------------------------------

    pub fn work_config(&self) -> WorkModeConfig {
        self.work_config.lock().unwrap().clone()
    }

    /// Validates, applies, persists and caches a new work config. The
    /// scheduler is re-armed first so a bad timer section rejects the
    /// whole update without touching the stored config.
    pub fn set_work_config(&self, config: WorkModeConfig) -> Result<()> {
        config.validate()?;
        self.scheduler.apply_timer_config(&config.timer_trigger)?;
        self.store.save_work_mode_config(&config)?;

        let old_mode = {
            let mut current = self.work_config.lock().unwrap();
            let old = current.work_mode;
            *current = config.clone();
            old
        };
        if old_mode != config.work_mode {
            info!(from = ?old_mode, to = ?config.work_mode, "Work mode changed");
            let callback = self.work_callback.lock().unwrap().clone();
            if let Some(cb) = callback {
                cb(old_mode, config.work_mode);
            }
        }
        Ok(())
    }

    /// Arms the timer schedule from the persisted config. Run once at
    /// boot, after the service registry is up.
    pub fn apply_boot_config(&self) -> Result<()> {
        let config = self.work_config.lock().unwrap().clone();
        self.scheduler.apply_timer_config(&config.timer_trigger)
    }

    // --- wakeup sources -----------------------------------------------

    pub fn configure_wakeup_source(&self, source: WakeupSource, settings: WakeupSourceSettings) {
        self.wakeup_table.lock().unwrap().configure(source, settings);
    }

    pub fn wakeup_settings(&self, source: WakeupSource) -> WakeupSourceSettings {
        self.wakeup_table.lock().unwrap().settings(source)
    }

    /// Stores the raw wakeup mask read at boot. Processing is deferred
    /// until the services that do capture work are running.
    pub fn store_boot_wakeup(&self, flags: WakeupFlags) {
        *self.stored_wakeup.lock().unwrap() = Some(flags);
    }

    /// Classifies the stored boot wakeup without consuming it. Used to
    /// pick the start-pass gating before services are up.
    pub fn boot_wakeup_source(&self) -> Option<WakeupSource> {
        (*self.stored_wakeup.lock().unwrap()).and_then(classify)
    }

    /// Processes the wakeup mask stored at boot, once. Returns the
    /// classified source, or `None` on cold boot.
    pub fn process_stored_wakeup(&self) -> Option<WakeupSource> {
        let flags = self.stored_wakeup.lock().unwrap().take()?;
        self.handle_wakeup(flags)
    }

    /// Classifies and dispatches a wakeup event: record activity, go
    /// Active, and queue a capture when the source is supported in the
    /// current power mode. Unsupported events are logged and dropped.
    pub fn handle_wakeup(&self, flags: WakeupFlags) -> Option<WakeupSource> {
        let source = match classify(flags) {
            Some(s) => s,
            None => {
                debug!(%flags, "Cold boot, no wakeup to dispatch");
                return None;
            }
        };
        info!(%flags, %source, "Wakeup classified");

        self.power.update_activity();
        self.set_system_state(SystemState::Active);

        let supported = self
            .wakeup_table
            .lock()
            .unwrap()
            .is_supported(source, self.power.mode());
        if supported {
            queue_capture(&self.capture_tx, CaptureTrigger::from(source));
        } else {
            warn!(%source, mode = ?self.power.mode(), "Wakeup source not supported, dropping");
        }
        Some(source)
    }

    // --- sleep --------------------------------------------------------

    /// Marks the capture task finished. In low power the device goes
    /// back to sleep once its task is done; full speed stays up for
    /// the idle timeout instead.
    pub fn task_completed(&self) {
        if self.power.mode() == PowerMode::LowPower {
            debug!("Capture task complete, sleep pending");
            self.sleep_pending.store(true, Ordering::SeqCst);
        }
    }

    pub fn sleep_pending(&self) -> bool {
        self.sleep_pending.load(Ordering::SeqCst)
    }

    /// Runs the pending sleep, if one was marked. Returns whether a
    /// sleep was attempted.
    pub fn execute_pending_sleep(&self) -> Result<bool> {
        if !self.sleep_pending.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        self.enter_sleep(0)?;
        Ok(true)
    }

    /// The sleep path. Persists both configs (best effort), plans the
    /// wakeup arming and power rails, then calls the sleep primitive.
    /// On real hardware a successful call does not return.
    pub fn enter_sleep(&self, requested_duration_sec: u32) -> Result<()> {
        if let Err(e) = self.store.save_power_mode_config(&self.power.config()) {
            warn!(error = %e, "Power config persist before sleep failed");
        }
        let work = self.work_config.lock().unwrap().clone();
        if let Err(e) = self.store.save_work_mode_config(&work) {
            warn!(error = %e, "Work config persist before sleep failed");
        }

        self.set_system_state(SystemState::Sleep);

        let plan = {
            let table = self.wakeup_table.lock().unwrap().clone();
            build_sleep_plan(
                self.power.mode(),
                &table,
                &work,
                requested_duration_sec,
                self.remote.as_ref(),
                self.rtc.as_ref(),
            )
        };
        info!(
            flags = %plan.flags,
            rails = %plan.rails,
            sleep_sec = plan.sleep_sec,
            "Entering sleep"
        );
        self.sleeper.enter_sleep(
            plan.flags,
            plan.rails,
            plan.sleep_sec,
            plan.alarm_a,
            plan.alarm_b,
        )
    }
}
