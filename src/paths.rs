//! Where settings and logs live
//!
//! Resolution order for both directories:
//! 1. `--config-dir` on the command line
//! 2. `SEQVIEW_CONFIG_DIR` environment variable
//! 3. The current directory, if it already holds a seqview file
//! 4. Platform directories from dirs-next (`~/.config/seqview`, `~/.local/share/seqview`)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "seqview.json";
pub const LOG_FILE: &str = "seqview.log";

const ENV_CONFIG_DIR: &str = "SEQVIEW_CONFIG_DIR";
const APP_DIR: &str = "seqview";

/// Directory override from CLI or environment
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// CLI wins over `SEQVIEW_CONFIG_DIR`
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var_os(ENV_CONFIG_DIR).map(PathBuf::from));
        Self { config_dir }
    }

    pub fn config_file(&self, name: &str) -> PathBuf {
        self.resolve(dirs_next::config_dir).join(name)
    }

    /// Logs and other generated files
    pub fn data_file(&self, name: &str) -> PathBuf {
        self.resolve(dirs_next::data_dir).join(name)
    }

    /// Create both directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.resolve(dirs_next::config_dir), self.resolve(dirs_next::data_dir)] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    fn resolve(&self, platform: fn() -> Option<PathBuf>) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }
        if let Ok(cwd) = std::env::current_dir()
            && has_local_files(&cwd)
        {
            return cwd;
        }
        platform()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn has_local_files(dir: &Path) -> bool {
    [SETTINGS_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_dir_wins() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(config.config_file(SETTINGS_FILE), PathBuf::from("/custom/seqview.json"));
        assert_eq!(config.data_file(LOG_FILE), PathBuf::from("/custom/seqview.log"));
    }

    #[test]
    fn test_cli_overrides_env() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from/cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from/cli")));
    }

    /// Test: ensure_dirs creates the override directory
    #[test]
    fn test_ensure_dirs() {
        let dir = std::env::temp_dir().join(format!("seqview_paths_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let config = PathConfig {
            config_dir: Some(dir.clone()),
        };
        config.ensure_dirs().unwrap();
        assert!(dir.is_dir());
        std::fs::remove_dir_all(&dir).ok();
    }
}
