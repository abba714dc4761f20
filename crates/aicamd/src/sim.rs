//! Host-side collaborator implementations for running the daemon off
//! target. The RTC sim actually fires interval tasks on the tokio
//! timer; calendar tasks are accepted but left to the hardware build.
//! The sleep sim records the request and returns, so a host run exits
//! its sleep path instead of powering down.

use crate::collaborators::{
    AlarmSlot, FireSpec, RemoteWakeupTransport, RtcAlarm, RtcCallback, RtcDriver, SleepPrimitive,
};
use aicam_common::{PowerRails, Result, WakeupFlags};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct SimTask {
    name: String,
    handle: Option<JoinHandle<()>>,
}

/// Wall-clock RTC backed by tokio timers.
#[derive(Default)]
pub struct SimRtc {
    tasks: Mutex<Vec<SimTask>>,
}

impl SimRtc {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RtcDriver for SimRtc {
    fn register_task(&self, name: &str, spec: FireSpec, callback: RtcCallback) -> Result<()> {
        let handle = match spec {
            FireSpec::Interval { secs } => {
                let period = Duration::from_secs(secs.max(1) as u64);
                Some(tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(period);
                    ticker.tick().await; // first tick is immediate
                    loop {
                        ticker.tick().await;
                        callback();
                    }
                }))
            }
            FireSpec::Calendar { .. } => {
                warn!(name, "Calendar tasks are not simulated on host");
                None
            }
        };
        self.tasks.lock().unwrap().push(SimTask {
            name: name.to_string(),
            handle,
        });
        Ok(())
    }

    fn unregister_task(&self, name: &str) {
        let mut tasks = self.tasks.lock().unwrap();
        for task in tasks.iter_mut().filter(|t| t.name == name) {
            if let Some(handle) = task.handle.take() {
                handle.abort();
            }
        }
        tasks.retain(|t| t.name != name);
    }

    fn next_fire_time(&self, _slot: AlarmSlot) -> Option<i64> {
        None
    }

    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

impl Drop for SimRtc {
    fn drop(&mut self) {
        for task in self.tasks.lock().unwrap().iter_mut() {
            if let Some(handle) = task.handle.take() {
                handle.abort();
            }
        }
    }
}

/// Logs the request and returns, standing in for the one-way door.
pub struct SimSleep;

impl SleepPrimitive for SimSleep {
    fn enter_sleep(
        &self,
        flags: WakeupFlags,
        rails: PowerRails,
        duration_sec: u32,
        alarm_a: Option<RtcAlarm>,
        alarm_b: Option<RtcAlarm>,
    ) -> Result<()> {
        info!(
            %flags,
            %rails,
            duration_sec,
            ?alarm_a,
            ?alarm_b,
            "Sleep requested (simulated, returning)"
        );
        Ok(())
    }
}

/// Transport handoff that always succeeds.
pub struct SimRemote;

impl RemoteWakeupTransport for SimRemote {
    fn stop_primary(&self) -> Result<()> {
        info!("Primary transport stopped (simulated)");
        Ok(())
    }

    fn switch_to_low_power(&self) -> Result<()> {
        info!("Switched to low-power transport (simulated)");
        Ok(())
    }

    fn enable_remote_wakeup(&self) -> Result<()> {
        info!("Remote wakeup enabled (simulated)");
        Ok(())
    }
}
