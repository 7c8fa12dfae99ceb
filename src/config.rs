//! Persistent viewer settings (`seqview.json`)

use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::core::sequence::DEFAULT_GLOB_CAPACITY;
use crate::core::texture::DEFAULT_MARGIN;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Texture streaming
    pub texture_margin: i32,      // Over-fetch around the visible rect, in pixels
    pub smooth_textures: bool,    // Linear filtering instead of nearest

    // Decode cache
    pub cache_enabled: bool,
    pub cache_capacity: usize,    // Max entries
    pub cache_memory_percent: f32, // Share of available memory (default 50%)
    pub reserve_system_memory_gb: f32,

    // File watching
    pub watch_files: bool,
    pub watch_interval_ms: u64,

    // Sequences / playback
    pub glob_capacity: usize,
    pub fps: f32,
    pub looping: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            texture_margin: DEFAULT_MARGIN,
            smooth_textures: false,
            cache_enabled: true,
            cache_capacity: 512,
            cache_memory_percent: 50.0,
            reserve_system_memory_gb: 2.0,
            watch_files: true,
            watch_interval_ms: 500,
            glob_capacity: DEFAULT_GLOB_CAPACITY,
            fps: 24.0,
            looping: true,
        }
    }
}

impl Settings {
    /// Read settings; a missing or broken file yields defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::read(path) {
            Ok(settings) => {
                info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write settings: {}", path.display()))?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Cache memory share as a fraction
    pub fn mem_fraction(&self) -> f64 {
        (self.cache_memory_percent as f64 / 100.0).clamp(0.05, 0.95)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("seqview_config_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("seqview.json")
    }

    /// Test: Save then load restores every field
    #[test]
    fn test_save_load() {
        let path = temp_file("roundtrip");
        let settings = Settings {
            texture_margin: 64,
            watch_files: false,
            fps: 30.0,
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    /// Test: Partial file
    /// Validates: Missing fields take their defaults
    #[test]
    fn test_partial_file_uses_defaults() {
        let path = temp_file("partial");
        std::fs::write(&path, r#"{ "texture_margin": 16 }"#).unwrap();
        let settings = Settings::load(&path);
        assert_eq!(settings.texture_margin, 16);
        assert_eq!(settings.cache_capacity, 512);
        assert_eq!(settings.glob_capacity, 4096);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_broken_file_is_not_fatal() {
        let path = temp_file("broken");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
