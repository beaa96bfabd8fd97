use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::restoration::RestorationConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Record scanned and generated content in the history store
    pub save_history: bool,
    /// Run the link inspector on URL results
    pub check_links: bool,
    /// Let the rqrr backend retry on an inverted image
    pub try_inverted: bool,
    /// Images larger than this are downscaled before decoding
    pub max_dimension: u32,
    pub restoration: RestorationConfig,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            save_history: true,
            check_links: true,
            try_inverted: true,
            max_dimension: 1600,
            restoration: RestorationConfig::default(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ScanSettings>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring malformed settings in {}: {}", path.display(), err);
                ScanSettings::default()
            })
        } else {
            ScanSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> ScanSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: ScanSettings) -> Result<()> {
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    /// Apply `change` to a copy of the current settings and persist the result
    pub fn modify(&self, change: impl FnOnce(&mut ScanSettings)) -> Result<ScanSettings> {
        let mut guard = self.write();
        let mut next = guard.clone();
        change(&mut next);
        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    pub fn reset(&self) -> Result<()> {
        self.update(ScanSettings::default())
    }

    fn read(&self) -> RwLockReadGuard<'_, ScanSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScanSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &ScanSettings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized)
            .with_context(|| format!("Failed to write settings to {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
