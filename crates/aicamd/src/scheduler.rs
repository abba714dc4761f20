//! RTC trigger scheduler.
//!
//! Translates the timer-trigger config into named tasks on the RTC
//! driver. Interval mode registers one recurring task; absolute mode
//! registers one calendar task per time node, all sharing a single
//! generated name so they can be torn down together. Fired tasks queue
//! a capture event and bump a counter; they never capture inline.

use crate::collaborators::{FireSpec, RepeatPolicy, RtcCallback, RtcDriver};
use crate::worker::{queue_capture, CaptureEvent};
use aicam_common::{
    map_weekdays_to_bits, AicamError, CaptureTrigger, Result, TimerCaptureMode,
    TimerTriggerConfig,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};

struct SchedulerInner {
    active_task: Option<String>,
    active_count: usize,
}

pub struct TriggerScheduler {
    rtc: Arc<dyn RtcDriver>,
    sink: mpsc::Sender<CaptureEvent>,
    inner: Mutex<SchedulerInner>,
    fired: Arc<AtomicU64>,
}

impl TriggerScheduler {
    pub fn new(rtc: Arc<dyn RtcDriver>, sink: mpsc::Sender<CaptureEvent>) -> Self {
        TriggerScheduler {
            rtc,
            sink,
            inner: Mutex::new(SchedulerInner {
                active_task: None,
                active_count: 0,
            }),
            fired: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Applies a timer config, replacing whatever was scheduled before.
    ///
    /// The task name is derived from the RTC clock
    /// (`timer_capture_<now % 10000>`); the name is unregistered before
    /// use, so an unrelated task that happens to collide is replaced.
    pub fn apply_timer_config(&self, config: &TimerTriggerConfig) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(name) = inner.active_task.take() {
            self.rtc.unregister_task(&name);
            inner.active_count = 0;
        }

        if !config.enabled {
            debug!("Timer trigger disabled");
            return Ok(());
        }

        let name = format!("timer_capture_{}", self.rtc.now().rem_euclid(10_000));
        self.rtc.unregister_task(&name);
        let callback = self.make_callback();

        let count = match config.capture_mode {
            TimerCaptureMode::Interval => {
                if config.interval_sec == 0 {
                    return Err(AicamError::InvalidParam(
                        "interval timer with zero period".into(),
                    ));
                }
                self.rtc.register_task(
                    &name,
                    FireSpec::Interval {
                        secs: config.interval_sec,
                    },
                    callback,
                )?;
                1
            }
            TimerCaptureMode::Absolute => {
                if config.time_nodes.is_empty() {
                    return Err(AicamError::InvalidParam(
                        "absolute timer with no time nodes".into(),
                    ));
                }
                for node in &config.time_nodes {
                    let repeat = if node.weekdays == 0 {
                        RepeatPolicy::Daily
                    } else {
                        RepeatPolicy::Weekly
                    };
                    self.rtc.register_task(
                        &name,
                        FireSpec::Calendar {
                            seconds_from_midnight: node.seconds_from_midnight,
                            weekdays: map_weekdays_to_bits(node.weekdays),
                            repeat,
                        },
                        callback.clone(),
                    )?;
                }
                config.time_nodes.len()
            }
        };

        info!(task = %name, registrations = count, "Timer trigger scheduled");
        inner.active_task = Some(name);
        inner.active_count = count;
        Ok(())
    }

    /// Tears down the active timer task, if any.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(name) = inner.active_task.take() {
            self.rtc.unregister_task(&name);
            inner.active_count = 0;
            debug!(task = %name, "Timer trigger stopped");
        }
    }

    pub fn active_task_name(&self) -> Option<String> {
        self.inner.lock().unwrap().active_task.clone()
    }

    /// Registrations held under the active name (1 for interval mode,
    /// one per time node for absolute mode, 0 when disabled).
    pub fn active_task_count(&self) -> usize {
        self.inner.lock().unwrap().active_count
    }

    /// Total timer fires since construction.
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    fn make_callback(&self) -> RtcCallback {
        let fired = self.fired.clone();
        let sink = self.sink.clone();
        Arc::new(move || {
            fired.fetch_add(1, Ordering::Relaxed);
            queue_capture(&sink, CaptureTrigger::Rtc);
        })
    }
}
