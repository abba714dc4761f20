//! AiCam orchestration daemon.
//!
//! Core of a battery-powered AI camera: a priority-ordered service
//! registry with dependency gating, a sticky readiness bus, the
//! low-power/full-speed power controller, wakeup classification and
//! dispatch, the RTC capture scheduler, and the sleep path that arms
//! wakeup sources and power rails before handing off to hardware.

pub mod collaborators;
pub mod controller;
pub mod power;
pub mod ready;
pub mod registry;
pub mod scheduler;
pub mod sim;
pub mod sleep;
pub mod testing;
pub mod wakeup;
pub mod worker;

pub use collaborators::{
    AlarmSlot, Clock, FireSpec, FnService, RemoteWakeupTransport, RepeatPolicy, RtcAlarm,
    RtcCallback, RtcDriver, Service, SleepPrimitive, SystemClock,
};
pub use controller::{ControllerDeps, SystemController};
pub use power::PowerModeController;
pub use ready::ReadinessBus;
pub use registry::{
    LifecycleStats, ServiceManager, ServiceSpec, ServiceStatus, MAX_DEPENDENCIES, MAX_SERVICES,
};
pub use scheduler::TriggerScheduler;
pub use sleep::{build_sleep_plan, SleepPlan};
pub use wakeup::{classify, WakeupSourceSettings, WakeupSourceTable};
pub use worker::{
    capture_channel, queue_capture, spawn_capture_worker, CaptureEvent, CaptureHandler,
    CAPTURE_QUEUE_DEPTH, READY_WAIT,
};
