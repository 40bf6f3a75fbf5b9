//! Configuration management for rotolog
//!
//! The configuration file is line-oriented, one `Key value` pair per line:
//!
//! ```text
//! LogDirectoryPath ~/logs
//! MaxLogFileSize 100MiB
//! RemoveLogsOlderThan 7d
//! LogLevel info
//! LogMode file
//! CheckPoint 23:30
//! EnableFileWatcher true
//! EnableAutoRemove true
//! ```
//!
//! Unknown keys are ignored. A malformed value leaves that option at its
//! default and is reported; it never fails the whole load.

pub mod store;
pub mod units;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::logging::{LogLevel, LogMode, RotationPolicy};
use store::{Value, ValueStore};
use units::{format_age, parse_age, FileSize, TimeOfDay};

pub const KEY_LOG_DIRECTORY: &str = "LogDirectoryPath";
pub const KEY_MAX_FILE_SIZE: &str = "MaxLogFileSize";
pub const KEY_REMOVE_OLDER_THAN: &str = "RemoveLogsOlderThan";
pub const KEY_LOG_LEVEL: &str = "LogLevel";
pub const KEY_LOG_MODE: &str = "LogMode";
pub const KEY_CHECK_POINT: &str = "CheckPoint";
pub const KEY_ENABLE_FILE_WATCHER: &str = "EnableFileWatcher";
pub const KEY_ENABLE_AUTO_REMOVE: &str = "EnableAutoRemove";

const CONFIG_FILE_NAME: &str = "rotolog.conf";

/// Logger configuration snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the dated log files (default: current directory)
    pub log_directory: PathBuf,

    /// Size above which the active file is rotated (default: 50MB)
    pub max_file_size: FileSize,

    /// Age after which rotated files are deleted; zero disables removal
    pub remove_logs_older_than: Duration,

    /// Minimum emitted level (default: debug, everything)
    pub level: LogLevel,

    /// Console or file output (default: console)
    pub mode: LogMode,

    /// Time of day at which the file is rotated regardless of size
    pub check_point: Option<TimeOfDay>,

    /// Run the rotation watcher (default: off)
    pub enable_file_watcher: bool,

    /// Run the retention sweeper (default: off)
    pub enable_auto_remove: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_file_size: FileSize::default(),
            remove_logs_older_than: Duration::ZERO,
            level: LogLevel::Debug,
            mode: LogMode::Console,
            check_point: None,
            enable_file_watcher: false,
            enable_auto_remove: false,
        }
    }
}

impl Config {
    /// Load configuration from file, or return default if not found
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let store = ValueStore::read(path).context("Failed to read config file")?;
            Ok(Self::from_store(&store))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        self.to_store()
            .write(path)
            .context("Failed to write config file")
    }

    /// Build a configuration from parsed key/value pairs
    pub fn from_store(store: &ValueStore) -> Self {
        let mut config = Self::default();

        if let Some(value) = store.get(KEY_LOG_DIRECTORY) {
            let raw = value.to_string();
            config.log_directory = PathBuf::from(shellexpand::tilde(&raw).into_owned());
        }
        if let Some(size) = option(store, KEY_MAX_FILE_SIZE, |s| s.parse::<FileSize>()) {
            config.max_file_size = size;
        }
        if let Some(age) = option(store, KEY_REMOVE_OLDER_THAN, parse_age) {
            config.remove_logs_older_than = age;
        }
        if let Some(level) = option(store, KEY_LOG_LEVEL, |s| s.parse::<LogLevel>()) {
            config.level = level;
        }
        if let Some(mode) = option(store, KEY_LOG_MODE, |s| s.parse::<LogMode>()) {
            config.mode = mode;
        }
        if let Some(check_point) = option(store, KEY_CHECK_POINT, |s| s.parse::<TimeOfDay>()) {
            config.check_point = Some(check_point);
        }
        if let Some(enabled) = flag(store, KEY_ENABLE_FILE_WATCHER) {
            config.enable_file_watcher = enabled;
        }
        if let Some(enabled) = flag(store, KEY_ENABLE_AUTO_REMOVE) {
            config.enable_auto_remove = enabled;
        }

        config
    }

    /// Key/value form written by [`Config::save`]
    pub fn to_store(&self) -> ValueStore {
        let mut store = ValueStore::new();
        store.insert(
            KEY_LOG_DIRECTORY,
            self.log_directory.to_string_lossy().into_owned(),
        );
        store.insert(KEY_MAX_FILE_SIZE, self.max_file_size.to_string());
        if !self.remove_logs_older_than.is_zero() {
            store.insert(KEY_REMOVE_OLDER_THAN, format_age(self.remove_logs_older_than));
        }
        store.insert(KEY_LOG_LEVEL, self.level.as_str().to_ascii_lowercase());
        store.insert(KEY_LOG_MODE, self.mode.as_str());
        if let Some(check_point) = self.check_point {
            store.insert(
                KEY_CHECK_POINT,
                format!("{}:{:02}", check_point.hour, check_point.minute),
            );
        }
        store.insert(KEY_ENABLE_FILE_WATCHER, self.enable_file_watcher);
        store.insert(KEY_ENABLE_AUTO_REMOVE, self.enable_auto_remove);
        store
    }

    /// Rotation settings of this snapshot
    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy {
            max_size: self.max_file_size,
            check_point: self.check_point,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rotolog settings")?;
        writeln!(f, "\t{}: {}", KEY_LOG_DIRECTORY, self.log_directory.display())?;
        writeln!(f, "\t{}: {}", KEY_MAX_FILE_SIZE, self.max_file_size)?;
        writeln!(f, "\t{}: {}", KEY_LOG_LEVEL, self.level)?;
        writeln!(f, "\t{}: {}", KEY_LOG_MODE, self.mode)?;
        match self.check_point {
            Some(check_point) => writeln!(f, "\t{}: {}", KEY_CHECK_POINT, check_point)?,
            None => writeln!(f, "\t{}: undefined", KEY_CHECK_POINT)?,
        }
        writeln!(
            f,
            "\t{}: {}ms",
            KEY_REMOVE_OLDER_THAN,
            self.remove_logs_older_than.as_millis()
        )?;
        writeln!(f, "\t{}: {}", KEY_ENABLE_FILE_WATCHER, self.enable_file_watcher)?;
        write!(f, "\t{}: {}", KEY_ENABLE_AUTO_REMOVE, self.enable_auto_remove)
    }
}

/// Parse a string option, reporting values that do not parse
fn option<T, E, F>(store: &ValueStore, key: &str, parse: F) -> Option<T>
where
    F: FnOnce(&str) -> Result<T, E>,
    E: fmt::Display,
{
    let value = store.get(key)?;
    let text = match value {
        Value::Str(text) => text.as_str(),
        other => {
            tracing::warn!("Unexpected configuration value for {}: {}", key, other);
            return None;
        }
    };
    match parse(text) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("Unexpected configuration value for {}: {}", key, e);
            None
        }
    }
}

fn flag(store: &ValueStore, key: &str) -> Option<bool> {
    if !store.contains_key(key) {
        return None;
    }
    match store.get_bool(key) {
        Ok(enabled) => Some(enabled),
        Err(e) => {
            tracing::warn!("Unexpected configuration value: {}", e);
            None
        }
    }
}

/// Get the base configuration directory (~/.rotolog)
/// Falls back to ./.rotolog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".rotolog")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".rotolog"))
}

/// Get the path to the default config file
pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}
