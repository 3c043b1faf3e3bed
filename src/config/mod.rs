// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration and persistence for DPT.
//!
//! This module provides the editor settings file (TOML), the score file
//! format (YAML) and a watcher that reloads settings when they change on
//! disk.

pub mod score;
pub mod watcher;

pub use score::{ClipRecord, ScoreFile};
pub use watcher::{SettingsEvent, SettingsWatcher};

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::coords::DEFAULT_PIXELS_PER_BEAT;
use crate::document::{DocumentOptions, DEFAULT_TRACK_COUNT};
use crate::tracks::DEFAULT_TRACK_HEIGHT;

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV: &str = "DPT_SETTINGS";

/// Settings file name used when no override is given
pub const SETTINGS_FILE_NAME: &str = "dpt-settings.toml";

/// Editor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Duration in beats of clips added from the timeline
    pub default_duration: f64,
    /// Track count of a new document
    pub default_track_count: usize,
    /// Track height in pixels of a new document
    pub track_height: f64,
    /// Horizontal resolution at zoom 1.0
    pub pixels_per_beat: f64,
    /// Directory last used to open a score
    pub last_open_directory: Option<PathBuf>,
    /// Directory last used to save a score
    pub last_save_directory: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_duration: 5.0,
            default_track_count: DEFAULT_TRACK_COUNT,
            track_height: DEFAULT_TRACK_HEIGHT,
            pixels_per_beat: DEFAULT_PIXELS_PER_BEAT,
            last_open_directory: None,
            last_save_directory: None,
        }
    }
}

impl Settings {
    /// Settings file location: `$DPT_SETTINGS`, else `./dpt-settings.toml`
    pub fn default_path() -> PathBuf {
        env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME))
    }

    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;
        Self::from_toml(&contents)
    }

    /// Parse settings from a TOML string
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text).context("Failed to parse settings TOML")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings to TOML")
    }

    /// Save settings to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = self.to_toml()?;
        fs::write(path.as_ref(), text)
            .with_context(|| format!("Failed to write settings file: {:?}", path.as_ref()))
    }

    /// Load settings, falling back to defaults.
    ///
    /// A missing file is created with the defaults. A corrupt file is left
    /// alone and the defaults are used for this session.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            let settings = Self::default();
            match settings.save(path) {
                Ok(()) => info!(?path, "wrote default settings"),
                Err(e) => warn!(?path, error = %e, "could not write default settings"),
            }
            return settings;
        }
        Self::read_or_default(path)
    }

    /// Load settings if the file exists and parses; never writes
    pub fn read_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(?path, error = %message, "settings unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Remember the directory of an opened score; true when it changed
    pub fn record_open(&mut self, score: &Path) -> bool {
        replace_directory(&mut self.last_open_directory, score)
    }

    /// Remember the directory of a saved score; true when it changed
    pub fn record_save(&mut self, score: &Path) -> bool {
        replace_directory(&mut self.last_save_directory, score)
    }

    /// Reject values a document cannot be built from
    pub fn validate(&self) -> Result<()> {
        if !self.default_duration.is_finite() || self.default_duration <= 0.0 {
            anyhow::bail!("default_duration must be positive, got {}", self.default_duration);
        }
        if !self.pixels_per_beat.is_finite() || self.pixels_per_beat <= 0.0 {
            anyhow::bail!("pixels_per_beat must be positive, got {}", self.pixels_per_beat);
        }
        if !self.track_height.is_finite() || self.track_height <= 0.0 {
            anyhow::bail!("track_height must be positive, got {}", self.track_height);
        }
        Ok(())
    }

    /// Parameters for a new document
    pub fn document_options(&self) -> DocumentOptions {
        DocumentOptions {
            track_count: self.default_track_count,
            track_height: self.track_height,
            pixels_per_beat: self.pixels_per_beat,
            default_duration: self.default_duration,
        }
    }
}

fn replace_directory(slot: &mut Option<PathBuf>, score: &Path) -> bool {
    let directory = match score.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Some(parent.to_path_buf()),
        _ => env::current_dir().ok(),
    };
    if directory.is_none() || *slot == directory {
        return false;
    }
    *slot = directory;
    true
}
