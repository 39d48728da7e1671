// SPDX-License-Identifier: AGPL-3.0
// Gosh Transfer Queue - Settings persistence
//
// Queue preferences are stored in a local JSON file.
// The transfers themselves are never persisted here.

use crate::eta::DEFAULT_SMOOTHING;
use crate::types::QueueError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Rows inserted per write-lock acquisition during initial population
pub const DEFAULT_ROWS_PER_CHUNK: usize = 2000;

/// Queue preferences (GUI-agnostic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSettings {
    /// All transfers paused by the user
    #[serde(default)]
    pub global_paused: bool,
    /// Chunk size for the initial load from the engine snapshot
    #[serde(default = "default_rows_per_chunk")]
    pub rows_per_chunk: usize,
    /// Weight of the newest speed sample in the ETA average
    #[serde(default = "default_eta_smoothing")]
    pub eta_smoothing: f64,
    /// Base URL used to build public links
    #[serde(default = "default_link_base_url")]
    pub link_base_url: String,
}

fn default_rows_per_chunk() -> usize {
    DEFAULT_ROWS_PER_CHUNK
}

fn default_eta_smoothing() -> f64 {
    DEFAULT_SMOOTHING
}

fn default_link_base_url() -> String {
    "https://mega.nz".to_string()
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            global_paused: false,
            rows_per_chunk: default_rows_per_chunk(),
            eta_smoothing: default_eta_smoothing(),
            link_base_url: default_link_base_url(),
        }
    }
}

/// Source of the persisted global pause preference
pub trait PausePreference: Send + Sync {
    fn global_paused(&self) -> bool;

    fn set_global_paused(&self, paused: bool);
}

/// In-memory cache of settings, persisted to disk on changes
pub struct SettingsStore {
    settings: RwLock<QueueSettings>,
    file_path: PathBuf,
}

impl SettingsStore {
    /// Create a settings store in the user's config directory
    pub fn new() -> Result<Self, QueueError> {
        Self::with_path(Self::get_settings_path()?)
    }

    /// Create a settings store backed by `file_path`, loading it if present
    pub fn with_path(file_path: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let file_path = file_path.into();
        tracing::info!("Queue settings file path: {:?}", file_path);

        let settings = if file_path.exists() {
            let content = fs::read_to_string(&file_path)
                .map_err(|e| QueueError::FileIo(format!("Failed to read settings: {}", e)))?;

            serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse queue settings, using defaults: {}", e);
                QueueSettings::default()
            })
        } else {
            tracing::info!("No queue settings file found, using defaults");
            QueueSettings::default()
        };

        let store = Self {
            settings: RwLock::new(settings),
            file_path,
        };

        if !store.file_path.exists() {
            store.persist()?;
        }

        Ok(store)
    }

    /// Get the path to the settings file
    fn get_settings_path() -> Result<PathBuf, QueueError> {
        let config_dir = directories::ProjectDirs::from("com", "gosh", "transfer")
            .ok_or_else(|| QueueError::FileIo("Could not determine config directory".to_string()))?
            .config_dir()
            .to_path_buf();

        Ok(config_dir.join("queue.json"))
    }

    /// Persist settings to disk
    fn persist(&self) -> Result<(), QueueError> {
        let content = {
            let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*settings).map_err(|e| {
                QueueError::Serialization(format!("Failed to serialize settings: {}", e))
            })?
        };

        if let Some(dir) = self.file_path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| QueueError::FileIo(format!("Failed to create config dir: {}", e)))?;
        }

        fs::write(&self.file_path, content)
            .map_err(|e| QueueError::FileIo(format!("Failed to write settings: {}", e)))?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Get current settings
    pub fn get(&self) -> QueueSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Update settings and persist to disk
    pub fn update(&self, new_settings: QueueSettings) -> Result<(), QueueError> {
        {
            let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            *settings = new_settings;
        }

        let result = self.persist();
        if let Err(e) = &result {
            tracing::error!("Failed to persist queue settings: {}", e);
        }
        result
    }
}

impl PausePreference for SettingsStore {
    fn global_paused(&self) -> bool {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .global_paused
    }

    fn set_global_paused(&self, paused: bool) {
        {
            let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            if settings.global_paused == paused {
                return;
            }
            settings.global_paused = paused;
        }

        if let Err(e) = self.persist() {
            tracing::error!("Failed to persist pause state: {}", e);
        }
    }
}
