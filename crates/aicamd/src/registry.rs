//! Service registry and lifecycle orchestrator.
//!
//! Services register with a priority, optional dependencies and a
//! low-power flag. Bulk passes walk the table in priority order (init,
//! start) or reverse order (stop, deinit), isolating per-service
//! failures: one bad service is recorded and skipped, never aborting
//! the pass. Readiness bits on the [`ReadinessBus`] are set when a
//! service reaches Running and cleared when it leaves.

use crate::collaborators::{Clock, Service};
use crate::ready::ReadinessBus;
use aicam_common::{AicamError, PowerMode, Result, ServiceState, WakeupSource};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub const MAX_SERVICES: usize = 16;
pub const MAX_DEPENDENCIES: usize = 4;

/// Static registration parameters for one service.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub name: String,
    /// Lower numbers init first.
    pub priority: u32,
    /// Names of services that must be Running before this one starts.
    pub depends_on: Vec<String>,
    /// Started even in low-power mode.
    pub required_in_low_power: bool,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        ServiceSpec {
            name: name.into(),
            priority,
            depends_on: Vec::new(),
            required_in_low_power: false,
        }
    }

    pub fn depends_on(mut self, dep: impl Into<String>) -> Self {
        self.depends_on.push(dep.into());
        self
    }

    pub fn required_in_low_power(mut self) -> Self {
        self.required_in_low_power = true;
        self
    }
}

struct ServiceEntry {
    spec: ServiceSpec,
    service: Box<dyn Service>,
    state: ServiceState,
    /// Bit index on the readiness bus, stable for the entry's lifetime.
    bit: u32,
    error_count: u32,
    last_error: Option<AicamError>,
    init_time_ms: Option<u64>,
    start_time_ms: Option<u64>,
    /// Registration order, tie-breaker for equal priorities.
    seq: u64,
}

/// Outcome counts for one bulk lifecycle pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Point-in-time view of one service for diagnostics.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub name: String,
    pub priority: u32,
    pub state: ServiceState,
    pub error_count: u32,
    pub last_error: Option<AicamError>,
    pub init_time_ms: Option<u64>,
    pub start_time_ms: Option<u64>,
}

struct ManagerInner {
    entries: Vec<ServiceEntry>,
    /// Bits currently assigned to live entries.
    allocated_bits: u32,
    next_seq: u64,
}

/// The registry. One per process; passes hold the lock end to end so a
/// bulk operation observes a consistent table.
pub struct ServiceManager {
    inner: Mutex<ManagerInner>,
    bus: ReadinessBus,
    clock: Arc<dyn Clock>,
}

impl ServiceManager {
    pub fn new(bus: ReadinessBus, clock: Arc<dyn Clock>) -> Self {
        ServiceManager {
            inner: Mutex::new(ManagerInner {
                entries: Vec::new(),
                allocated_bits: 0,
                next_seq: 0,
            }),
            bus,
            clock,
        }
    }

    pub fn bus(&self) -> &ReadinessBus {
        &self.bus
    }

    /// Registers a service. Fails on duplicate name, full table, or too
    /// many dependencies. The table is kept sorted by priority, with
    /// registration order breaking ties.
    pub fn register(&self, spec: ServiceSpec, service: Box<dyn Service>) -> Result<()> {
        if spec.name.is_empty() {
            return Err(AicamError::InvalidParam("empty service name".into()));
        }
        if spec.depends_on.len() > MAX_DEPENDENCIES {
            return Err(AicamError::InvalidParam(format!(
                "service {}: {} dependencies (max {MAX_DEPENDENCIES})",
                spec.name,
                spec.depends_on.len()
            )));
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.entries.iter().any(|e| e.spec.name == spec.name) {
            return Err(AicamError::AlreadyInitialized(spec.name));
        }
        if inner.entries.len() >= MAX_SERVICES {
            return Err(AicamError::CapacityExceeded(format!(
                "service table full ({MAX_SERVICES})"
            )));
        }

        let bit = (0..MAX_SERVICES as u32)
            .find(|b| inner.allocated_bits & (1 << b) == 0)
            .ok_or_else(|| AicamError::CapacityExceeded("no readiness bit free".into()))?;
        inner.allocated_bits |= 1 << bit;

        let seq = inner.next_seq;
        inner.next_seq += 1;
        debug!(name = %spec.name, priority = spec.priority, bit, "Registering service");
        inner.entries.push(ServiceEntry {
            spec,
            service,
            state: ServiceState::Uninitialized,
            bit,
            error_count: 0,
            last_error: None,
            init_time_ms: None,
            start_time_ms: None,
            seq,
        });
        inner
            .entries
            .sort_by_key(|e| (e.spec.priority, e.seq));
        Ok(())
    }

    /// Removes a service, deinitializing it first if needed. Its
    /// readiness bit is cleared and returned to the free pool.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let idx = inner
            .entries
            .iter()
            .position(|e| e.spec.name == name)
            .ok_or_else(|| AicamError::NotFound(name.into()))?;

        let entry = &mut inner.entries[idx];
        if entry.state == ServiceState::Running {
            if let Err(e) = entry.service.stop() {
                warn!(name, error = %e, "Stop during unregister failed");
            }
        }
        if matches!(
            entry.state,
            ServiceState::Running | ServiceState::Initialized | ServiceState::Error
        ) {
            if let Err(e) = entry.service.deinit() {
                warn!(name, error = %e, "Deinit during unregister failed");
            }
        }
        self.bus.clear(entry.bit);
        let bit = entry.bit;
        inner.entries.remove(idx);
        inner.allocated_bits &= !(1 << bit);
        info!(name, "Service unregistered");
        Ok(())
    }

    /// Readiness bit index for a registered service.
    pub fn bit_for(&self, name: &str) -> Result<u32> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .iter()
            .find(|e| e.spec.name == name)
            .map(|e| e.bit)
            .ok_or_else(|| AicamError::NotFound(name.into()))
    }

    /// Readiness mask covering several services at once.
    pub fn mask_for(&self, names: &[&str]) -> Result<u32> {
        let mut mask = 0;
        for name in names {
            mask |= 1 << self.bit_for(name)?;
        }
        Ok(mask)
    }

    pub fn service_state(&self, name: &str) -> Result<ServiceState> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .iter()
            .find(|e| e.spec.name == name)
            .map(|e| e.state)
            .ok_or_else(|| AicamError::NotFound(name.into()))
    }

    pub fn status(&self) -> Vec<ServiceStatus> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .iter()
            .map(|e| ServiceStatus {
                name: e.spec.name.clone(),
                priority: e.spec.priority,
                state: e.state,
                error_count: e.error_count,
                last_error: e.last_error.clone(),
                init_time_ms: e.init_time_ms,
                start_time_ms: e.start_time_ms,
            })
            .collect()
    }

    /// Initializes every Uninitialized service in priority order. A
    /// failing init marks that service Error and moves on.
    pub fn init_all(&self) -> LifecycleStats {
        let mut inner = self.inner.lock().unwrap();
        let mut stats = LifecycleStats::default();
        let now = self.clock.now_ms();

        for entry in inner.entries.iter_mut() {
            if entry.state != ServiceState::Uninitialized {
                stats.skipped += 1;
                continue;
            }
            stats.attempted += 1;
            entry.state = ServiceState::Initializing;
            match entry.service.init() {
                Ok(()) => {
                    entry.state = ServiceState::Initialized;
                    entry.init_time_ms = Some(now);
                    stats.succeeded += 1;
                    debug!(name = %entry.spec.name, "Service initialized");
                }
                Err(e) => {
                    entry.state = ServiceState::Error;
                    entry.error_count += 1;
                    entry.last_error = Some(e.clone());
                    stats.failed += 1;
                    warn!(name = %entry.spec.name, error = %e, "Service init failed");
                }
            }
        }
        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            "Init pass complete"
        );
        stats
    }

    /// Starts Initialized services in priority order.
    ///
    /// Gating: a service starts only when it is required in low power,
    /// or the device runs full speed, or the wakeup cause was the
    /// button or an unknown source (diagnostic wake gets everything).
    /// A service whose dependency is not Running is skipped with
    /// `DependencyNotReady` recorded; its state stays Initialized so a
    /// later pass can pick it up.
    pub fn start_all(
        &self,
        mode: PowerMode,
        wakeup: Option<WakeupSource>,
    ) -> LifecycleStats {
        let mut inner = self.inner.lock().unwrap();
        let mut stats = LifecycleStats::default();
        let now = self.clock.now_ms();
        let full_start = mode == PowerMode::FullSpeed
            || matches!(wakeup, Some(WakeupSource::Button) | Some(WakeupSource::Other));

        for idx in 0..inner.entries.len() {
            if inner.entries[idx].state != ServiceState::Initialized {
                stats.skipped += 1;
                continue;
            }
            if !inner.entries[idx].spec.required_in_low_power && !full_start {
                debug!(name = %inner.entries[idx].spec.name, "Not started in low power");
                stats.skipped += 1;
                continue;
            }

            let blocked = blocked_dependency(&inner.entries, idx);
            let entry = &mut inner.entries[idx];
            if let Some(dep) = blocked {
                warn!(name = %entry.spec.name, dependency = %dep, "Dependency not ready");
                entry.last_error = Some(AicamError::DependencyNotReady(dep));
                stats.skipped += 1;
                continue;
            }

            stats.attempted += 1;
            match entry.service.start() {
                Ok(()) => {
                    entry.state = ServiceState::Running;
                    entry.start_time_ms = Some(now);
                    stats.succeeded += 1;
                    self.bus.set(entry.bit);
                    info!(name = %entry.spec.name, "Service running");
                }
                Err(e) => {
                    entry.state = ServiceState::Error;
                    entry.error_count += 1;
                    entry.last_error = Some(e.clone());
                    stats.failed += 1;
                    warn!(name = %entry.spec.name, error = %e, "Service start failed");
                }
            }
        }
        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            "Start pass complete"
        );
        stats
    }

    /// Stops Running services in reverse priority order. Stopping a
    /// service that is not Running is a recorded no-op, not an error.
    pub fn stop_all(&self) -> LifecycleStats {
        let mut inner = self.inner.lock().unwrap();
        let mut stats = LifecycleStats::default();

        for entry in inner.entries.iter_mut().rev() {
            if entry.state != ServiceState::Running {
                stats.skipped += 1;
                continue;
            }
            stats.attempted += 1;
            match entry.service.stop() {
                Ok(()) => {
                    entry.state = ServiceState::Initialized;
                    stats.succeeded += 1;
                    debug!(name = %entry.spec.name, "Service stopped");
                }
                Err(e) => {
                    entry.state = ServiceState::Error;
                    entry.error_count += 1;
                    entry.last_error = Some(e.clone());
                    stats.failed += 1;
                    warn!(name = %entry.spec.name, error = %e, "Service stop failed");
                }
            }
            self.bus.clear(entry.bit);
        }
        stats
    }

    /// Deinitializes everything in reverse priority order. Running
    /// services are stopped first (best effort). State always returns
    /// to Uninitialized and the readiness bit is always cleared, even
    /// when the service's deinit errors.
    pub fn deinit_all(&self) -> LifecycleStats {
        let mut inner = self.inner.lock().unwrap();
        let mut stats = LifecycleStats::default();

        for entry in inner.entries.iter_mut().rev() {
            if entry.state == ServiceState::Uninitialized {
                stats.skipped += 1;
                continue;
            }
            if entry.state == ServiceState::Running {
                if let Err(e) = entry.service.stop() {
                    warn!(name = %entry.spec.name, error = %e, "Stop before deinit failed");
                    entry.error_count += 1;
                }
            }
            stats.attempted += 1;
            match entry.service.deinit() {
                Ok(()) => {
                    stats.succeeded += 1;
                    debug!(name = %entry.spec.name, "Service deinitialized");
                }
                Err(e) => {
                    entry.error_count += 1;
                    entry.last_error = Some(e.clone());
                    stats.failed += 1;
                    warn!(name = %entry.spec.name, error = %e, "Service deinit failed");
                }
            }
            entry.state = ServiceState::Uninitialized;
            entry.init_time_ms = None;
            entry.start_time_ms = None;
            self.bus.clear(entry.bit);
        }
        stats
    }

    /// Starts one service by name. Bypasses the power-mode gate
    /// (explicit operator intent) but still enforces dependencies.
    pub fn start_one(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let idx = inner
            .entries
            .iter()
            .position(|e| e.spec.name == name)
            .ok_or_else(|| AicamError::NotFound(name.into()))?;

        if inner.entries[idx].state == ServiceState::Running {
            return Ok(());
        }
        if inner.entries[idx].state != ServiceState::Initialized {
            return Err(AicamError::NotInitialized);
        }
        if let Some(dep) = blocked_dependency(&inner.entries, idx) {
            inner.entries[idx].last_error = Some(AicamError::DependencyNotReady(dep.clone()));
            return Err(AicamError::DependencyNotReady(dep));
        }

        let now = self.clock.now_ms();
        let entry = &mut inner.entries[idx];
        match entry.service.start() {
            Ok(()) => {
                entry.state = ServiceState::Running;
                entry.start_time_ms = Some(now);
                self.bus.set(entry.bit);
                info!(name, "Service running");
                Ok(())
            }
            Err(e) => {
                entry.state = ServiceState::Error;
                entry.error_count += 1;
                entry.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Stops one service by name. Not-Running is `Unavailable`.
    pub fn stop_one(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .entries
            .iter_mut()
            .find(|e| e.spec.name == name)
            .ok_or_else(|| AicamError::NotFound(name.into()))?;

        if entry.state != ServiceState::Running {
            return Err(AicamError::Unavailable(format!("{name} not running")));
        }
        let result = entry.service.stop();
        match &result {
            Ok(()) => entry.state = ServiceState::Initialized,
            Err(e) => {
                entry.state = ServiceState::Error;
                entry.error_count += 1;
                entry.last_error = Some(e.clone());
            }
        }
        self.bus.clear(entry.bit);
        result
    }
}

/// First dependency of `entries[idx]` that is not Running, if any.
/// A dependency missing from the table blocks too.
fn blocked_dependency(entries: &[ServiceEntry], idx: usize) -> Option<String> {
    for dep in &entries[idx].spec.depends_on {
        let running = entries
            .iter()
            .any(|e| &e.spec.name == dep && e.state == ServiceState::Running);
        if !running {
            return Some(dep.clone());
        }
    }
    None
}
