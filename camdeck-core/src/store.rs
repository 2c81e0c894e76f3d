//! Per-device settings storage.
//!
//! [`SettingsStore`] is the single choke point for settings writes. The UI,
//! the reconciliation engine and the face-tracking loop all merge through
//! [`SettingsStore::update`]; the render pipeline only reads snapshots.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::{CameraSettings, SettingsPatch};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested device has no settings yet.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    /// An I/O error occurred during persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Settings JSON could not be produced or parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The store has no data directory.
    #[error("No data directory configured")]
    NoDataDir,
}

#[derive(Debug, Clone, Default)]
struct DeviceEntry {
    settings: CameraSettings,
    revision: u64,
}

/// Thread-safe settings store keyed by camera device id.
///
/// Settings are created with defaults on first reference and live for the
/// session. Every effective change bumps the device's revision, which hosts
/// use to decide when a reconciliation pass is due.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    devices: Arc<RwLock<HashMap<String, DeviceEntry>>>,
    /// Optional data directory for filesystem persistence.
    data_dir: Option<PathBuf>,
}

impl SettingsStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that writes each device's settings to
    /// `<data_dir>/<device>.json` after every change.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            devices: Arc::default(),
            data_dir: Some(data_dir),
        })
    }

    /// Settings for a device, creating defaults on first reference.
    #[must_use]
    pub fn get_or_create(&self, device_id: &str) -> CameraSettings {
        let mut devices = self
            .devices
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        devices
            .entry(device_id.to_string())
            .or_insert_with(|| {
                tracing::debug!("Creating default settings for device {device_id}");
                DeviceEntry::default()
            })
            .settings
            .clone()
    }

    /// Settings for a device if it has been referenced.
    #[must_use]
    pub fn snapshot(&self, device_id: &str) -> Option<CameraSettings> {
        let devices = self
            .devices
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        devices.get(device_id).map(|e| e.settings.clone())
    }

    /// Merge a partial update. Creates the device if needed.
    ///
    /// Returns `true` if any field changed, in which case the revision is
    /// bumped exactly once.
    pub fn update(&self, device_id: &str, patch: &SettingsPatch) -> bool {
        if patch.is_empty() {
            return false;
        }
        let changed = {
            let mut devices = self
                .devices
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let entry = devices.entry(device_id.to_string()).or_default();
            let changed = entry.settings.merge(patch);
            if changed {
                entry.revision += 1;
            }
            changed
        };
        if changed {
            tracing::debug!(
                "Updated {} control(s) for device {device_id}",
                patch.len()
            );
            self.persist_device(device_id);
        }
        changed
    }

    /// Revision counter for a device (0 for unknown devices and fresh defaults).
    #[must_use]
    pub fn revision(&self, device_id: &str) -> u64 {
        let devices = self
            .devices
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        devices.get(device_id).map_or(0, |e| e.revision)
    }

    /// Restore a device to defaults.
    pub fn reset(&self, device_id: &str) {
        {
            let mut devices = self
                .devices
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let entry = devices.entry(device_id.to_string()).or_default();
            entry.settings = CameraSettings::default();
            entry.revision += 1;
        }
        self.persist_device(device_id);
    }

    /// Every referenced device id, sorted.
    #[must_use]
    pub fn device_ids(&self) -> Vec<String> {
        let devices = self
            .devices
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut ids: Vec<String> = devices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Export a device's settings as a flat JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DeviceNotFound`] for an unreferenced device.
    pub fn export_json(&self, device_id: &str) -> Result<String, StoreError> {
        let settings = self
            .snapshot(device_id)
            .ok_or_else(|| StoreError::DeviceNotFound(device_id.to_string()))?;
        Ok(serde_json::to_string_pretty(&settings)?)
    }

    /// Import a flat JSON settings object, merging it over the device's
    /// current settings. Keys absent from the object are left untouched.
    ///
    /// Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the JSON does not describe
    /// camera settings.
    pub fn import_json(&self, device_id: &str, json: &str) -> Result<bool, StoreError> {
        let patch: SettingsPatch = serde_json::from_str(json)?;
        Ok(self.update(device_id, &patch))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn device_path(&self, device_id: &str) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", sanitize_filename(device_id))))
    }

    fn persist_device(&self, device_id: &str) {
        let Some(path) = self.device_path(device_id) else {
            return;
        };
        let json = match self.export_json(device_id) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("Failed to serialize settings for {device_id}: {e}");
                return;
            }
        };
        if let Err(e) = std::fs::write(&path, json) {
            tracing::warn!(
                "Failed to persist settings for {device_id} to {}: {e}",
                path.display()
            );
        }
    }

    /// Load a device's persisted settings into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no data directory or the file is missing
    /// or malformed.
    pub fn load_device_from_disk(&self, device_id: &str) -> Result<bool, StoreError> {
        let path = self.device_path(device_id).ok_or(StoreError::NoDataDir)?;
        let contents = std::fs::read_to_string(&path)?;
        self.import_json(device_id, &contents)
    }
}

/// Replace any character that is not alphanumeric, `-` or `_` with `_`.
fn sanitize_filename(device_id: &str) -> String {
    device_id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
