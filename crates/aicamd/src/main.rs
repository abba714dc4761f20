//! AiCam Daemon - camera orchestration core
//!
//! Boots the service registry, processes the stored wakeup cause, runs
//! the capture worker and the power-timeout poller, and tears the
//! services down on ctrl-c. Hardware collaborators are simulated so
//! the daemon runs on a host.

use aicamd::sim::{SimRemote, SimRtc, SimSleep};
use aicamd::{
    capture_channel, spawn_capture_worker, CaptureHandler, ControllerDeps, FnService,
    ReadinessBus, ServiceManager, ServiceSpec, SystemClock, SystemController, READY_WAIT,
};
use aicam_common::WakeupFlags;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("AiCam Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let data_dir =
        std::env::var("AICAM_DATA_DIR").unwrap_or_else(|_| "/var/lib/aicam".to_string());
    let store = Arc::new(aicam_common::JsonConfigStore::new(data_dir));
    let clock = Arc::new(SystemClock::new());
    let rtc = Arc::new(SimRtc::new());
    let (capture_tx, capture_rx) = capture_channel();

    let controller = Arc::new(SystemController::new(ControllerDeps {
        store,
        clock: clock.clone(),
        rtc,
        sleeper: Arc::new(SimSleep),
        remote: Arc::new(SimRemote),
        capture_tx,
    })?);

    // On hardware the wake companion chip supplies the raw mask; on a
    // host it comes from the environment so the replay path still runs.
    if let Ok(raw) = std::env::var("AICAM_WAKEUP_FLAGS") {
        match parse_wakeup_flags(&raw) {
            Some(flags) => {
                info!(%flags, "Boot wakeup flags from environment");
                controller.store_boot_wakeup(flags);
            }
            None => warn!(%raw, "Ignoring unparseable AICAM_WAKEUP_FLAGS"),
        }
    }

    let bus = ReadinessBus::new();
    let manager = Arc::new(ServiceManager::new(bus.clone(), clock));
    register_services(&manager)?;

    // Boot sequence: init everything, start what the mode allows, then
    // replay the wakeup cause once capture dependencies can come up.
    manager.init_all();
    let mode = controller.power().mode();
    let start_stats = manager.start_all(mode, controller.boot_wakeup_source());
    info!(?mode, ?start_stats, "Services started");
    controller.apply_boot_config()?;
    controller.process_stored_wakeup();

    let capture_mask = manager.mask_for(&["communication", "messaging"])?;
    let handler: CaptureHandler = {
        let controller = controller.clone();
        Arc::new(move |event| {
            info!(trigger = ?event.trigger, "Capture");
            controller.task_completed();
        })
    };
    let worker = spawn_capture_worker(capture_rx, bus, capture_mask, READY_WAIT, handler);

    // Idle-timeout poll plus pending-sleep execution.
    let poller = {
        let controller = controller.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                if let Err(e) = controller.power().check_timeout() {
                    warn!(error = %e, "Power timeout check failed");
                }
                match controller.execute_pending_sleep() {
                    Ok(true) => info!("Woke from simulated sleep"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "Sleep entry failed"),
                }
            }
        })
    };

    info!("AiCam Daemon ready");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down gracefully");

    poller.abort();
    worker.abort();
    manager.stop_all();
    manager.deinit_all();

    Ok(())
}

/// Raw wakeup mask from the environment, `0x`-prefixed hex or decimal.
fn parse_wakeup_flags(raw: &str) -> Option<WakeupFlags> {
    let raw = raw.trim();
    let bits = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => raw.parse::<u32>().ok()?,
    };
    Some(WakeupFlags::from_bits(bits))
}

/// Static service table: power and system first, the outward-facing
/// services last. Web and OTA only run at full speed and need the
/// communication stack.
fn register_services(manager: &ServiceManager) -> Result<()> {
    let stub = |name: &'static str| {
        FnService::new()
            .on_start(move || {
                info!(name, "service started");
                Ok(())
            })
            .on_stop(move || {
                info!(name, "service stopped");
                Ok(())
            })
    };

    manager.register(
        ServiceSpec::new("power", 1).required_in_low_power(),
        Box::new(stub("power")),
    )?;
    manager.register(
        ServiceSpec::new("system", 2).required_in_low_power(),
        Box::new(stub("system")),
    )?;
    manager.register(
        ServiceSpec::new("device", 3).required_in_low_power(),
        Box::new(stub("device")),
    )?;
    manager.register(
        ServiceSpec::new("communication", 4).required_in_low_power(),
        Box::new(stub("communication")),
    )?;
    manager.register(
        ServiceSpec::new("messaging", 5)
            .depends_on("communication")
            .required_in_low_power(),
        Box::new(stub("messaging")),
    )?;
    manager.register(
        ServiceSpec::new("web", 6).depends_on("communication"),
        Box::new(stub("web")),
    )?;
    manager.register(
        ServiceSpec::new("ota", 6).depends_on("communication"),
        Box::new(stub("ota")),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wakeup_flags_hex_and_decimal() {
        assert_eq!(
            parse_wakeup_flags("0x21"),
            Some(WakeupFlags::VALID | WakeupFlags::CONFIG_KEY)
        );
        assert_eq!(parse_wakeup_flags(" 33 "), parse_wakeup_flags("0x21"));
        assert_eq!(parse_wakeup_flags("0X3"), Some(WakeupFlags::from_bits(3)));
    }

    #[test]
    fn test_parse_wakeup_flags_rejects_garbage() {
        assert_eq!(parse_wakeup_flags(""), None);
        assert_eq!(parse_wakeup_flags("0x"), None);
        assert_eq!(parse_wakeup_flags("flags"), None);
        assert_eq!(parse_wakeup_flags("-5"), None);
    }
}
