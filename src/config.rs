//! Configuration for the hooks bridge.
//!
//! Layered with figment, lowest to highest precedence:
//! - Default values
//! - Global file `<config_dir>/hookbridge/settings.toml`
//! - Workspace file `.hookbridge/settings.toml` (searched upwards from cwd)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `HOOKBRIDGE_` and use double
//! underscores to separate nested levels:
//! - `HOOKBRIDGE_HOOKS__POLL_INTERVAL_MS=50` sets `hooks.poll_interval_ms`
//! - `HOOKBRIDGE_HOOKS__BACKEND=native` sets `hooks.backend`
//! - `HOOKBRIDGE_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::hooks::{SourceKind, WatcherConfig};

/// Directory holding workspace settings.
pub const CONFIG_DIR_NAME: &str = ".hookbridge";

/// Settings file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "settings.toml";

const ENV_PREFIX: &str = "HOOKBRIDGE_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Session directory and watcher settings
    #[serde(default)]
    pub hooks: HooksConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HooksConfig {
    /// Parent of all session directories (defaults to `<tmp>/hookbridge/hooks`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Scan interval for the poll backend
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Backstop rescan interval for the native backend
    #[serde(default = "default_rescan_interval_ms")]
    pub rescan_interval_ms: u64,

    /// How new event files are noticed: auto, native or poll
    #[serde(default)]
    pub backend: SourceKind,

    /// Program invoked by generated hook commands
    #[serde(default = "default_program")]
    pub program: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for all targets
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `hookbridge::hooks = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_rescan_interval_ms() -> u64 {
    1000
}
fn default_program() -> String {
    crate::hooks::claude::DEFAULT_PROGRAM.to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            hooks: HooksConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            poll_interval_ms: default_poll_interval_ms(),
            rescan_interval_ms: default_rescan_interval_ms(),
            backend: SourceKind::default(),
            program: default_program(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        if let Some(global) = Self::global_config_path() {
            figment = figment.merge(Toml::file(global));
        }

        let workspace = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));

        figment
            .merge(Toml::file(workspace))
            .merge(Self::env_provider())
            .extract()
            .map_err(Box::new)
    }

    /// Load configuration from a specific file (plus environment overrides)
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Self::env_provider())
            .extract()
            .map_err(Box::new)
    }

    /// `HOOKBRIDGE_` variables, with `__` separating nested keys
    fn env_provider() -> Env {
        Env::prefixed(ENV_PREFIX).map(|key| {
            key.as_str()
                .to_lowercase()
                .replace("__", ".") // Double underscore becomes dot
                .into()
        })
    }

    /// `<config_dir>/hookbridge/settings.toml`, if the platform has one
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hookbridge").join(CONFIG_FILE_NAME))
    }

    /// Find the workspace settings file by looking for `.hookbridge`
    /// from the current directory up to root
    pub fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR_NAME);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE_NAME));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default workspace settings file in `dir`
    pub fn init_config_file(dir: &Path, force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }

    /// Watcher parameters for `session_id` derived from these settings
    pub fn watcher_config(&self, session_id: impl Into<String>) -> WatcherConfig {
        WatcherConfig {
            session_id: session_id.into(),
            base_dir: self.hooks.base_dir.clone(),
            poll_interval: Duration::from_millis(self.hooks.poll_interval_ms),
            rescan_interval: Duration::from_millis(self.hooks.rescan_interval_ms),
            source: self.hooks.backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.hooks.poll_interval_ms, 100);
        assert_eq!(settings.hooks.rescan_interval_ms, 1000);
        assert_eq!(settings.hooks.backend, SourceKind::Poll);
        assert!(settings.hooks.base_dir.is_none());
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[hooks]
base_dir = "/var/run/hookbridge"
poll_interval_ms = 50
backend = "native"

[logging]
default = "info"

[logging.modules]
"hookbridge::hooks" = "debug"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.hooks.base_dir, Some(PathBuf::from("/var/run/hookbridge")));
        assert_eq!(settings.hooks.poll_interval_ms, 50);
        assert_eq!(settings.hooks.backend, SourceKind::Native);
        // Unspecified values keep their defaults
        assert_eq!(settings.hooks.rescan_interval_ms, 1000);
        assert_eq!(settings.logging.default, "info");
        assert_eq!(settings.logging.modules["hookbridge::hooks"], "debug");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.hooks.poll_interval_ms, 100);
        assert_eq!(settings.version, 1);
    }

    #[test]
    fn test_invalid_backend_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "[hooks]\nbackend = \"carrier-pigeon\"\n").unwrap();

        assert!(Settings::load_from(&config_path).is_err());
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.hooks.poll_interval_ms = 25;
        settings.hooks.backend = SourceKind::Auto;
        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.hooks.poll_interval_ms, 25);
        assert_eq!(loaded.hooks.backend, SourceKind::Auto);
    }

    #[test]
    fn test_init_config_file_respects_force() {
        let temp_dir = TempDir::new().unwrap();

        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
        assert_eq!(path, temp_dir.path().join(".hookbridge").join("settings.toml"));
        assert!(path.exists());

        assert!(Settings::init_config_file(temp_dir.path(), false).is_err());
        assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "[hooks]\nprogram = \"from-file\"\n").unwrap();

        unsafe {
            std::env::set_var("HOOKBRIDGE_HOOKS__PROGRAM", "from-env");
        }

        let settings = Settings::load_from(&config_path).unwrap();

        unsafe {
            std::env::remove_var("HOOKBRIDGE_HOOKS__PROGRAM");
        }

        assert_eq!(settings.hooks.program, "from-env");
    }

    #[test]
    fn test_watcher_config_from_settings() {
        let mut settings = Settings::default();
        settings.hooks.base_dir = Some(PathBuf::from("/srv/hooks"));
        settings.hooks.poll_interval_ms = 40;

        let config = settings.watcher_config("abc");
        assert_eq!(config.session_id, "abc");
        assert_eq!(config.base_dir, Some(PathBuf::from("/srv/hooks")));
        assert_eq!(config.poll_interval, Duration::from_millis(40));
        assert_eq!(config.source, SourceKind::Poll);
    }
}
