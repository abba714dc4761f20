//! Config persistence behind a store trait.
//!
//! Configs are small JSON documents. The production store writes them
//! atomically (temp file + rename) so a power cut mid-write never
//! leaves a truncated file; loads fall back to defaults when a file is
//! missing or unreadable, and write the defaults back.

use crate::error::Result;
use crate::power_config::PowerModeConfig;
use crate::work_config::WorkModeConfig;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

pub const POWER_MODE_FILE: &str = "power_mode.json";
pub const WORK_MODE_FILE: &str = "work_mode.json";

/// Persistence seam for the two device configs.
pub trait ConfigStore: Send + Sync {
    fn load_power_mode_config(&self) -> Result<PowerModeConfig>;
    fn save_power_mode_config(&self, config: &PowerModeConfig) -> Result<()>;
    fn load_work_mode_config(&self) -> Result<WorkModeConfig>;
    fn save_work_mode_config(&self, config: &WorkModeConfig) -> Result<()>;
}

/// Write data to a file atomically using temp file + rename.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Stores each config as a JSON file under a data directory.
pub struct JsonConfigStore {
    data_dir: PathBuf,
}

impl JsonConfigStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        JsonConfigStore {
            data_dir: data_dir.into(),
        }
    }

    fn load_or_default<T>(&self, file: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + serde::Serialize + Default,
    {
        let path = self.data_dir.join(file);
        match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => Ok(value),
                Err(e) => {
                    warn!("Corrupt config {}: {} - using defaults", path.display(), e);
                    let value = T::default();
                    self.save(file, &value)?;
                    Ok(value)
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {} - writing defaults", path.display());
                let value = T::default();
                self.save(file, &value)?;
                Ok(value)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save<T: serde::Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.data_dir.join(file);
        let json = serde_json::to_string_pretty(value)?;
        atomic_write(&path, json.as_bytes())?;
        Ok(())
    }
}

impl ConfigStore for JsonConfigStore {
    fn load_power_mode_config(&self) -> Result<PowerModeConfig> {
        self.load_or_default(POWER_MODE_FILE)
    }

    fn save_power_mode_config(&self, config: &PowerModeConfig) -> Result<()> {
        self.save(POWER_MODE_FILE, config)
    }

    fn load_work_mode_config(&self) -> Result<WorkModeConfig> {
        self.load_or_default(WORK_MODE_FILE)
    }

    fn save_work_mode_config(&self, config: &WorkModeConfig) -> Result<()> {
        self.save(WORK_MODE_FILE, config)
    }
}

#[derive(Default)]
struct MemoryInner {
    power: PowerModeConfig,
    work: WorkModeConfig,
    power_saves: u64,
    work_saves: u64,
}

/// In-memory store for tests. Counts save calls so persistence
/// idempotence is assertable.
#[derive(Default)]
pub struct MemoryConfigStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power_save_count(&self) -> u64 {
        self.inner.lock().unwrap().power_saves
    }

    pub fn work_save_count(&self) -> u64 {
        self.inner.lock().unwrap().work_saves
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_power_mode_config(&self) -> Result<PowerModeConfig> {
        Ok(self.inner.lock().unwrap().power.clone())
    }

    fn save_power_mode_config(&self, config: &PowerModeConfig) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.power = config.clone();
        inner.power_saves += 1;
        Ok(())
    }

    fn load_work_mode_config(&self) -> Result<WorkModeConfig> {
        Ok(self.inner.lock().unwrap().work.clone())
    }

    fn save_work_mode_config(&self, config: &WorkModeConfig) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.work = config.clone();
        inner.work_saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PowerMode;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults_and_writes_back() {
        let dir = TempDir::new().unwrap();
        let store = JsonConfigStore::new(dir.path());

        let config = store.load_power_mode_config().unwrap();
        assert_eq!(config, PowerModeConfig::default());
        assert!(dir.path().join(POWER_MODE_FILE).exists());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonConfigStore::new(dir.path());

        let mut config = PowerModeConfig::default();
        config.current_mode = PowerMode::FullSpeed;
        config.mode_switch_count = 7;
        store.save_power_mode_config(&config).unwrap();

        assert_eq!(store.load_power_mode_config().unwrap(), config);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(WORK_MODE_FILE);
        fs::write(&path, "{not json").unwrap();

        let store = JsonConfigStore::new(dir.path());
        let config = store.load_work_mode_config().unwrap();
        assert_eq!(config, WorkModeConfig::default());

        // The defaults were written back over the corrupt file.
        let text = fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<WorkModeConfig>(&text).is_ok());
    }

    #[test]
    fn test_no_stray_temp_file_after_write() {
        let dir = TempDir::new().unwrap();
        let store = JsonConfigStore::new(dir.path());
        store
            .save_work_mode_config(&WorkModeConfig::default())
            .unwrap();

        let stray: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(stray.is_empty());
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryConfigStore::new();
        store
            .save_power_mode_config(&PowerModeConfig::default())
            .unwrap();
        store
            .save_power_mode_config(&PowerModeConfig::default())
            .unwrap();
        assert_eq!(store.power_save_count(), 2);
        assert_eq!(store.work_save_count(), 0);
    }
}
