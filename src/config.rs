//! Service options and XDG config directory resolution
//!
//! Options are plain serde structs with every field defaulted, so a JSON
//! file only needs to name what it overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::{env, file, timing, xsettings};
use crate::environment::EnvSource;

/// Tunables for the settings service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsOptions {
    /// Quiet period before a burst of changes is reported
    pub debounce_ms: u64,

    /// XSettings key holding the icon theme name
    pub protocol_key: String,

    pub file_source: FileSourceOptions,
}

/// Where the file-backed source looks for its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSourceOptions {
    /// Path appended to each config directory
    pub relative_path: String,

    /// Key read from the section-less part of the file
    pub key: String,

    /// Used when neither the user nor any system file has a value
    pub fallback_theme: String,
}

impl Default for SettingsOptions {
    fn default() -> Self {
        Self {
            debounce_ms: timing::DEBOUNCE_MS,
            protocol_key: xsettings::ICON_THEME_NAME.to_string(),
            file_source: FileSourceOptions::default(),
        }
    }
}

impl Default for FileSourceOptions {
    fn default() -> Self {
        Self {
            relative_path: file::RELATIVE_PATH.to_string(),
            key: file::ICON_THEME_KEY.to_string(),
            fallback_theme: file::FALLBACK_THEME.to_string(),
        }
    }
}

impl SettingsOptions {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Load options from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read options file {}", path.display()))?;
        let options: Self = serde_json::from_str(&contents)
            .context(format!("Failed to parse options file {}", path.display()))?;
        info!(path = %path.display(), debounce_ms = options.debounce_ms, "Loaded settings options");
        Ok(options)
    }
}

/// Per-user and system-wide XDG config directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XdgDirs {
    pub user: PathBuf,
    pub system: Vec<PathBuf>,
}

impl XdgDirs {
    /// Resolve directories per the XDG base directory rules
    pub fn from_env(vars: &dyn EnvSource) -> Self {
        let user = vars
            .var(env::XDG_CONFIG_HOME)
            .map(PathBuf::from)
            .filter(|p| p.is_absolute())
            .or_else(|| {
                vars.var(env::HOME)
                    .map(PathBuf::from)
                    .filter(|p| p.is_absolute())
                    .map(|home| home.join(".config"))
            })
            .or_else(dirs::config_dir)
            .unwrap_or_else(|| PathBuf::from(".config"));

        let mut system: Vec<PathBuf> = vars
            .var(env::XDG_CONFIG_DIRS)
            .map(|dirs| {
                dirs.split(':')
                    .filter(|d| !d.is_empty())
                    .map(PathBuf::from)
                    .filter(|p| p.is_absolute())
                    .collect()
            })
            .unwrap_or_default();
        if system.is_empty() {
            system.push(PathBuf::from(file::DEFAULT_SYSTEM_CONFIG_DIR));
        }

        debug!(user = %user.display(), system = ?system, "Resolved XDG config directories");
        Self { user, system }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env_of;

    #[test]
    fn test_default_options() {
        let options = SettingsOptions::default();
        assert_eq!(options.debounce(), Duration::from_millis(400));
        assert_eq!(options.protocol_key, "Net/IconThemeName");
        assert_eq!(options.file_source.relative_path, "razor/razor.conf");
        assert_eq!(options.file_source.key, "icon_theme");
        assert_eq!(options.file_source.fallback_theme, "oxygen");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options: SettingsOptions =
            serde_json::from_str(r#"{"debounce_ms": 150, "file_source": {"fallback_theme": "breeze"}}"#)
                .unwrap();
        assert_eq!(options.debounce_ms, 150);
        assert_eq!(options.file_source.fallback_theme, "breeze");
        assert_eq!(options.file_source.key, "icon_theme");
        assert_eq!(options.protocol_key, "Net/IconThemeName");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, r#"{"protocol_key": "Gtk/IconThemeName"}"#).unwrap();

        let options = SettingsOptions::load(&path).unwrap();
        assert_eq!(options.protocol_key, "Gtk/IconThemeName");
        assert_eq!(options.debounce_ms, 400);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SettingsOptions::load(&dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn test_xdg_dirs_from_env() {
        let vars = env_of(&[
            ("XDG_CONFIG_HOME", "/home/alice/.cfg"),
            ("XDG_CONFIG_DIRS", "/etc/xdg/razor::relative/dir:/usr/share/config"),
        ]);
        let dirs = XdgDirs::from_env(&vars);
        assert_eq!(dirs.user, PathBuf::from("/home/alice/.cfg"));
        assert_eq!(
            dirs.system,
            vec![PathBuf::from("/etc/xdg/razor"), PathBuf::from("/usr/share/config")]
        );
    }

    #[test]
    fn test_xdg_dirs_system_default() {
        let vars = env_of(&[("XDG_CONFIG_HOME", "/home/bob/.config")]);
        let dirs = XdgDirs::from_env(&vars);
        assert_eq!(dirs.system, vec![PathBuf::from("/etc/xdg")]);
    }

    #[test]
    fn test_xdg_dirs_relative_config_home_ignored() {
        let vars = env_of(&[("XDG_CONFIG_HOME", "relative"), ("HOME", "/home/carol")]);
        let dirs = XdgDirs::from_env(&vars);
        assert_eq!(dirs.user, PathBuf::from("/home/carol/.config"));
    }

    #[test]
    fn test_xdg_dirs_user_from_injected_home() {
        let vars = env_of(&[("HOME", "/srv/users/dave")]);
        let dirs = XdgDirs::from_env(&vars);
        assert_eq!(dirs.user, PathBuf::from("/srv/users/dave/.config"));
    }
}
