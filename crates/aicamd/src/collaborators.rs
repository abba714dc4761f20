//! Seams to the world outside the orchestration core.
//!
//! Peripheral register programming, the RTC hardware, the actual sleep
//! entry and the messaging transports all live behind narrow traits so
//! the core stays host-testable. Production wires real drivers in; the
//! tests and the host binary wire in fakes/sims.

use aicam_common::{PowerRails, Result, WakeupFlags};
use std::sync::Arc;
use std::time::Instant;

/// Millisecond uptime source for activity/idle accounting.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Monotonic-ish wall clock anchored at construction.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// How often a registered RTC task repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatPolicy {
    Interval,
    Daily,
    Weekly,
}

/// When a registered RTC task fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireSpec {
    /// Every `secs` seconds from registration.
    Interval { secs: u32 },
    /// At a time of day, gated by a weekday bitmask (bit 0 = Monday).
    Calendar {
        seconds_from_midnight: u32,
        weekdays: u8,
        repeat: RepeatPolicy,
    },
}

/// Hardware alarm slot used across sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmSlot {
    A,
    B,
}

/// Callback invoked when a registered RTC task fires.
pub type RtcCallback = Arc<dyn Fn() + Send + Sync>;

/// RTC hardware abstraction: named timer tasks plus alarm lookahead.
///
/// Several tasks may share a name; `unregister_task` removes them all.
pub trait RtcDriver: Send + Sync {
    fn register_task(&self, name: &str, spec: FireSpec, callback: RtcCallback) -> Result<()>;
    /// Removes every task registered under `name`. Idempotent.
    fn unregister_task(&self, name: &str);
    /// Next scheduled fire time for an alarm slot, Unix seconds.
    fn next_fire_time(&self, slot: AlarmSlot) -> Option<i64>;
    /// Current device time, Unix seconds.
    fn now(&self) -> i64;
}

/// Calendar alarm handed to the sleep hardware (UTC fields).
/// `weekday` is 1..=7, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcAlarm {
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// The one-way door. On real hardware a successful call never returns;
/// host implementations return `Ok(())` so the flow stays testable.
pub trait SleepPrimitive: Send + Sync {
    fn enter_sleep(
        &self,
        flags: WakeupFlags,
        rails: PowerRails,
        duration_sec: u32,
        alarm_a: Option<RtcAlarm>,
        alarm_b: Option<RtcAlarm>,
    ) -> Result<()>;
}

/// Messaging handoff performed before arming remote wakeup.
///
/// The primary transport cannot survive sleep, so remote wakeup needs a
/// stop / switch / enable sequence against the low-power radio. Any
/// step may fail; the caller then leaves remote wakeup unarmed and
/// sleeps anyway.
pub trait RemoteWakeupTransport: Send + Sync {
    fn stop_primary(&self) -> Result<()>;
    fn switch_to_low_power(&self) -> Result<()>;
    fn enable_remote_wakeup(&self) -> Result<()>;
}

/// Per-service lifecycle hooks driven by the registry.
pub trait Service: Send {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }
    fn start(&mut self) -> Result<()> {
        Ok(())
    }
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
    fn deinit(&mut self) -> Result<()> {
        Ok(())
    }
}

type LifecycleFn = Box<dyn FnMut() -> Result<()> + Send>;

/// Builds a `Service` from closures. Phases left unset are no-ops.
#[derive(Default)]
pub struct FnService {
    init: Option<LifecycleFn>,
    start: Option<LifecycleFn>,
    stop: Option<LifecycleFn>,
    deinit: Option<LifecycleFn>,
}

impl FnService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_init(mut self, f: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        self.init = Some(Box::new(f));
        self
    }

    pub fn on_start(mut self, f: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    pub fn on_stop(mut self, f: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        self.stop = Some(Box::new(f));
        self
    }

    pub fn on_deinit(mut self, f: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        self.deinit = Some(Box::new(f));
        self
    }
}

fn run(slot: &mut Option<LifecycleFn>) -> Result<()> {
    match slot {
        Some(f) => f(),
        None => Ok(()),
    }
}

impl Service for FnService {
    fn init(&mut self) -> Result<()> {
        run(&mut self.init)
    }

    fn start(&mut self) -> Result<()> {
        run(&mut self.start)
    }

    fn stop(&mut self) -> Result<()> {
        run(&mut self.stop)
    }

    fn deinit(&mut self) -> Result<()> {
        run(&mut self.deinit)
    }
}
