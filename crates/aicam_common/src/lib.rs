//! Shared types for the AiCam orchestration core.
//!
//! Everything that crosses a crate boundary lives here: the error
//! taxonomy, system/power/wakeup enums, the hardware-compatible
//! wakeup/power-rail bitmasks, the persisted configuration structs,
//! and the `ConfigStore` persistence seam.

pub mod error;
pub mod flags;
pub mod persist;
pub mod power_config;
pub mod types;
pub mod work_config;

pub use error::{AicamError, Result};
pub use flags::{PowerRails, WakeupFlags};
pub use persist::{ConfigStore, JsonConfigStore, MemoryConfigStore};
pub use power_config::PowerModeConfig;
pub use types::{
    CaptureTrigger, PowerMode, PowerTrigger, ServiceState, SystemState, WakeupSource, WorkMode,
};
pub use work_config::{
    map_weekdays_to_bits, IoEdge, IoTriggerConfig, PirTriggerConfig, RemoteTriggerConfig,
    TimeNode, TimerCaptureMode, TimerTriggerConfig, WorkModeConfig, MAX_TIME_NODES, WEEKDAYS_ALL,
};
