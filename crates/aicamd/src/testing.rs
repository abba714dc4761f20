//! Deterministic collaborator fakes, shared by unit and integration
//! tests (and usable by host-side tooling).

use crate::collaborators::{
    AlarmSlot, Clock, FireSpec, RemoteWakeupTransport, RtcAlarm, RtcCallback, RtcDriver, Service,
    SleepPrimitive,
};
use aicam_common::{AicamError, PowerRails, Result, WakeupFlags};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Manually advanced millisecond clock.
#[derive(Default)]
pub struct FakeClock {
    ms: AtomicU64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set_ms(&self, ms: u64) {
        self.ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }
}

struct FakeTask {
    name: String,
    spec: FireSpec,
    callback: RtcCallback,
}

/// In-memory RTC: tasks accumulate per name, `unregister_task` removes
/// every registration under the name, and tests fire tasks by hand.
pub struct FakeRtcDriver {
    now: AtomicI64,
    tasks: Mutex<Vec<FakeTask>>,
    next_a: Mutex<Option<i64>>,
    next_b: Mutex<Option<i64>>,
    fail_register: AtomicBool,
}

impl FakeRtcDriver {
    pub fn new() -> Self {
        FakeRtcDriver {
            now: AtomicI64::new(0),
            tasks: Mutex::new(Vec::new()),
            next_a: Mutex::new(None),
            next_b: Mutex::new(None),
            fail_register: AtomicBool::new(false),
        }
    }

    pub fn set_now(&self, ts: i64) {
        self.now.store(ts, Ordering::SeqCst);
    }

    pub fn set_next_fire(&self, slot: AlarmSlot, ts: Option<i64>) {
        match slot {
            AlarmSlot::A => *self.next_a.lock().unwrap() = ts,
            AlarmSlot::B => *self.next_b.lock().unwrap() = ts,
        }
    }

    pub fn fail_next_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn task_count(&self, name: &str) -> usize {
        self.tasks.lock().unwrap().iter().filter(|t| t.name == name).count()
    }

    pub fn specs_for(&self, name: &str) -> Vec<FireSpec> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.name == name)
            .map(|t| t.spec.clone())
            .collect()
    }

    /// Invokes every callback registered under `name`.
    pub fn fire(&self, name: &str) {
        let callbacks: Vec<RtcCallback> = self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.name == name)
            .map(|t| t.callback.clone())
            .collect();
        for cb in callbacks {
            cb();
        }
    }
}

impl Default for FakeRtcDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcDriver for FakeRtcDriver {
    fn register_task(&self, name: &str, spec: FireSpec, callback: RtcCallback) -> Result<()> {
        if self.fail_register.swap(false, Ordering::SeqCst) {
            return Err(AicamError::Unavailable("rtc register".into()));
        }
        self.tasks.lock().unwrap().push(FakeTask {
            name: name.to_string(),
            spec,
            callback,
        });
        Ok(())
    }

    fn unregister_task(&self, name: &str) {
        self.tasks.lock().unwrap().retain(|t| t.name != name);
    }

    fn next_fire_time(&self, slot: AlarmSlot) -> Option<i64> {
        match slot {
            AlarmSlot::A => *self.next_a.lock().unwrap(),
            AlarmSlot::B => *self.next_b.lock().unwrap(),
        }
    }

    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// One recorded sleep entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepCall {
    pub flags: WakeupFlags,
    pub rails: PowerRails,
    pub duration_sec: u32,
    pub alarm_a: Option<RtcAlarm>,
    pub alarm_b: Option<RtcAlarm>,
}

/// Records sleep requests and returns instead of powering down.
#[derive(Default)]
pub struct FakeSleepPrimitive {
    calls: Mutex<Vec<SleepCall>>,
    fail: AtomicBool,
}

impl FakeSleepPrimitive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SleepCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Option<SleepCall> {
        self.calls.lock().unwrap().last().cloned()
    }
}

impl SleepPrimitive for FakeSleepPrimitive {
    fn enter_sleep(
        &self,
        flags: WakeupFlags,
        rails: PowerRails,
        duration_sec: u32,
        alarm_a: Option<RtcAlarm>,
        alarm_b: Option<RtcAlarm>,
    ) -> Result<()> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(AicamError::Unavailable("sleep hardware".into()));
        }
        self.calls.lock().unwrap().push(SleepCall {
            flags,
            rails,
            duration_sec,
            alarm_a,
            alarm_b,
        });
        Ok(())
    }
}

/// Scripted transport handoff: any of the three steps can be told to
/// fail; successful steps are logged in order.
#[derive(Default)]
pub struct FakeRemoteTransport {
    fail_stop: AtomicBool,
    fail_switch: AtomicBool,
    fail_enable: AtomicBool,
    log: Mutex<Vec<&'static str>>,
}

impl FakeRemoteTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_stop(&self) {
        self.fail_stop.store(true, Ordering::SeqCst);
    }

    pub fn fail_switch(&self) {
        self.fail_switch.store(true, Ordering::SeqCst);
    }

    pub fn fail_enable(&self) {
        self.fail_enable.store(true, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }
}

impl RemoteWakeupTransport for FakeRemoteTransport {
    fn stop_primary(&self) -> Result<()> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(AicamError::Unavailable("stop primary".into()));
        }
        self.log.lock().unwrap().push("stop_primary");
        Ok(())
    }

    fn switch_to_low_power(&self) -> Result<()> {
        if self.fail_switch.load(Ordering::SeqCst) {
            return Err(AicamError::Unavailable("switch transport".into()));
        }
        self.log.lock().unwrap().push("switch_to_low_power");
        Ok(())
    }

    fn enable_remote_wakeup(&self) -> Result<()> {
        if self.fail_enable.load(Ordering::SeqCst) {
            return Err(AicamError::Unavailable("enable remote wakeup".into()));
        }
        self.log.lock().unwrap().push("enable_remote_wakeup");
        Ok(())
    }
}

/// Which lifecycle phase a [`RecordingService`] should fail in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPhase {
    Init,
    Start,
    Stop,
    Deinit,
}

/// Appends `"name:phase"` entries to a shared log so tests can assert
/// lifecycle ordering across services.
pub struct RecordingService {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    fail_in: Option<FailPhase>,
}

impl RecordingService {
    pub fn new(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        RecordingService {
            name,
            log,
            fail_in: None,
        }
    }

    pub fn failing_in(mut self, phase: FailPhase) -> Self {
        self.fail_in = Some(phase);
        self
    }

    fn record(&mut self, phase: FailPhase, label: &str) -> Result<()> {
        if self.fail_in == Some(phase) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}!", self.name, label));
            return Err(AicamError::Internal(format!("{} {label} failed", self.name)));
        }
        self.log.lock().unwrap().push(format!("{}:{}", self.name, label));
        Ok(())
    }
}

impl Service for RecordingService {
    fn init(&mut self) -> Result<()> {
        self.record(FailPhase::Init, "init")
    }

    fn start(&mut self) -> Result<()> {
        self.record(FailPhase::Start, "start")
    }

    fn stop(&mut self) -> Result<()> {
        self.record(FailPhase::Stop, "stop")
    }

    fn deinit(&mut self) -> Result<()> {
        self.record(FailPhase::Deinit, "deinit")
    }
}
