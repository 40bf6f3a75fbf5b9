//! The logging context: configuration, pipeline and watchers in one place
//!
//! A `LogContext` is created explicitly at startup and shared by `Arc`.
//! Configuration setters only stage changes; they take effect at the next
//! [`LogContext::initialize`].

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};

use super::level::{LogLevel, LogMode};
use super::queue::MessageQueue;
use super::record::LogRecord;
use super::retention::{RetentionPolicy, RetentionSweeper, DEFAULT_SWEEP_INTERVAL};
use super::rotation::{RotationPolicy, RotationWatcher, DEFAULT_CHECK_INTERVAL};
use super::sink::{ConsoleWriterFactory, SinkManager};
use super::worker::{LogWorker, DEFAULT_POLL_INTERVAL};
use crate::config::units::{FileSize, TimeOfDay};
use crate::config::Config;

/// Timing and output overrides, mostly useful in tests
pub struct ContextOptions {
    /// Time between rotation checks
    pub rotation_interval: Duration,
    /// Time between retention sweeps
    pub sweep_interval: Duration,
    /// Worker wait when idle or paused
    pub poll_interval: Duration,
    /// Console writer; stdout when `None`
    pub console: Option<ConsoleWriterFactory>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            rotation_interval: DEFAULT_CHECK_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            console: None,
        }
    }
}

/// Process-wide logging entry point
pub struct LogContext {
    /// Staged configuration, applied by `initialize`
    staged: RwLock<Config>,
    /// Configuration in effect since the last `initialize`
    active: RwLock<Config>,
    min_level: AtomicU8,
    queue: Arc<MessageQueue<String>>,
    sink: Arc<SinkManager>,
    worker: LogWorker,
    rotation: RotationWatcher,
    retention: RetentionSweeper,
}

impl LogContext {
    /// Create a context with the given configuration staged
    pub fn new(config: Config) -> Self {
        Self::with_options(config, ContextOptions::default())
    }

    pub fn with_options(config: Config, options: ContextOptions) -> Self {
        let sink = Arc::new(match options.console {
            Some(make_console) => SinkManager::with_console(make_console),
            None => SinkManager::new(),
        });
        let queue = Arc::new(MessageQueue::new());
        let worker =
            LogWorker::with_poll_interval(Arc::clone(&queue), Arc::clone(&sink), options.poll_interval);

        Self {
            min_level: AtomicU8::new(config.level as u8),
            active: RwLock::new(config.clone()),
            staged: RwLock::new(config),
            queue,
            sink,
            worker,
            rotation: RotationWatcher::with_interval(options.rotation_interval),
            retention: RetentionSweeper::with_interval(options.sweep_interval),
        }
    }

    /// Create a context from a configuration file
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = Config::load(path)?;
        tracing::info!("{}", config);
        Ok(Self::new(config))
    }

    /// Apply the staged configuration and start logging
    ///
    /// Opens (or, when a file is already active, rotates into) the sink,
    /// starts the worker, and restarts the watchers whose flags are set.
    /// If the sink cannot be opened, the previous level, sink and watchers
    /// stay in effect.
    pub fn initialize(&self) -> Result<()> {
        let config = self.config();

        let file_watcher_was_running = self.rotation.stop();
        let auto_remove_was_running = self.retention.stop();

        let applied = match (self.sink.mode(), config.mode) {
            (Some(LogMode::File), LogMode::File) => self
                .sink
                .reopen(&config.log_directory)
                .context("Failed to reopen log file"),
            _ => self
                .sink
                .initialize(config.mode, &config.log_directory)
                .context("Failed to initialize log sink"),
        };
        if let Err(e) = applied {
            self.restart_watchers(file_watcher_was_running, auto_remove_was_running);
            return Err(e);
        }

        self.min_level.store(config.level as u8, Ordering::Release);
        *write_lock(&self.active) = config.clone();

        self.worker.start()?;

        if config.enable_file_watcher {
            self.enable_file_watcher()?;
        }
        if config.enable_auto_remove {
            self.enable_auto_remove()?;
        }

        tracing::debug!(
            "Logging initialized (level: {}, mode: {})",
            config.level,
            config.mode
        );
        Ok(())
    }

    fn restart_watchers(&self, file_watcher: bool, auto_remove: bool) {
        if file_watcher {
            if let Err(e) = self.enable_file_watcher() {
                tracing::warn!("Failed to restart file watcher: {:#}", e);
            }
        }
        if auto_remove {
            if let Err(e) = self.enable_auto_remove() {
                tracing::warn!("Failed to restart auto remove: {:#}", e);
            }
        }
    }

    /// Whether a message at `level` would be emitted
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.level().admits(level)
    }

    /// Render and enqueue a message if its level passes the filter
    pub fn log(&self, level: LogLevel, message: impl Display) {
        if !self.enabled(level) {
            return;
        }
        let record = LogRecord::new(level, message.to_string());
        self.queue.enqueue(record.render());
    }

    pub fn debug(&self, message: impl Display) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Display) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Display) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Display) {
        self.log(LogLevel::Error, message);
    }

    pub fn fatal(&self, message: impl Display) {
        self.log(LogLevel::Fatal, message);
    }

    /// Start the rotation watcher for the active configuration
    ///
    /// Returns `Ok(false)` when it is already running or the sink is not in
    /// file mode.
    pub fn enable_file_watcher(&self) -> Result<bool> {
        let config = read_lock(&self.active).clone();
        if config.mode != LogMode::File {
            tracing::debug!("File watcher needs file mode, not starting it");
            return Ok(false);
        }

        let size_sink = Arc::clone(&self.sink);
        let reopen_sink = Arc::clone(&self.sink);
        let directory = config.log_directory.clone();
        self.rotation.start(
            config.rotation_policy(),
            move || size_sink.current_size(),
            move || {
                if let Err(e) = reopen_sink.reopen(&directory) {
                    tracing::error!("Log rotation failed: {:#}", e);
                }
            },
        )
    }

    pub fn disable_file_watcher(&self) -> bool {
        self.rotation.stop()
    }

    /// Start the retention sweeper for the active configuration
    ///
    /// Returns `Ok(false)` when it is already running, the sink is not in
    /// file mode, or no maximum age is configured.
    pub fn enable_auto_remove(&self) -> Result<bool> {
        let config = read_lock(&self.active).clone();
        if config.mode != LogMode::File || config.remove_logs_older_than.is_zero() {
            tracing::debug!("Auto remove needs file mode and a maximum age, not starting it");
            return Ok(false);
        }

        let policy =
            RetentionPolicy::rotated_logs(config.log_directory, config.remove_logs_older_than)?;
        self.retention.start(policy)
    }

    pub fn disable_auto_remove(&self) -> bool {
        self.retention.stop()
    }

    pub fn is_file_watcher_running(&self) -> bool {
        self.rotation.is_running()
    }

    pub fn is_auto_remove_running(&self) -> bool {
        self.retention.is_running()
    }

    /// Stop the watchers, write what is queued and close the sink
    pub fn shutdown(&self) {
        self.rotation.stop();
        self.retention.stop();
        self.worker.stop();
        self.sink.close();
    }

    /// Minimum level currently in effect
    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Acquire))
    }

    /// Path of the active log file in file mode
    pub fn current_file(&self) -> Option<PathBuf> {
        self.sink.current_path()
    }

    /// Number of lines waiting to be written
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Copy of the staged configuration
    pub fn config(&self) -> Config {
        read_lock(&self.staged).clone()
    }

    /// Copy of the configuration applied by the last `initialize`
    pub fn active_config(&self) -> Config {
        read_lock(&self.active).clone()
    }

    pub fn replace_config(&self, config: Config) {
        *write_lock(&self.staged) = config;
    }

    /// Stage the configuration read from `path`
    pub fn load_config_file(&self, path: &Path) -> Result<()> {
        let config = Config::load(path)?;
        tracing::info!("{}", config);
        self.replace_config(config);
        Ok(())
    }

    pub fn set_level(&self, level: LogLevel) {
        self.stage(|config| config.level = level);
    }

    pub fn set_mode(&self, mode: LogMode) {
        self.stage(|config| config.mode = mode);
    }

    pub fn set_directory(&self, directory: impl Into<PathBuf>) {
        let directory = directory.into();
        self.stage(|config| config.log_directory = directory);
    }

    pub fn set_max_file_size(&self, size: FileSize) {
        self.stage(|config| config.max_file_size = size);
    }

    pub fn set_check_point(&self, check_point: Option<TimeOfDay>) {
        self.stage(|config| config.check_point = check_point);
    }

    pub fn set_rotation_policy(&self, policy: RotationPolicy) {
        self.stage(|config| {
            config.max_file_size = policy.max_size;
            config.check_point = policy.check_point;
        });
    }

    /// Age after which rotated files are removed; zero disables removal
    pub fn set_max_age(&self, max_age: Duration) {
        self.stage(|config| config.remove_logs_older_than = max_age);
    }

    pub fn set_file_watcher_enabled(&self, enabled: bool) {
        self.stage(|config| config.enable_file_watcher = enabled);
    }

    pub fn set_auto_remove_enabled(&self, enabled: bool) {
        self.stage(|config| config.enable_auto_remove = enabled);
    }

    fn stage(&self, change: impl FnOnce(&mut Config)) {
        change(&mut write_lock(&self.staged));
    }
}

impl Drop for LogContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn read_lock(lock: &RwLock<Config>) -> std::sync::RwLockReadGuard<'_, Config> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock(lock: &RwLock<Config>) -> std::sync::RwLockWriteGuard<'_, Config> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Log at a level with space-joined arguments
///
/// Arguments are only rendered when the level passes the filter.
///
/// ```
/// use rotolog::{log_at, LogContext, LogLevel};
///
/// let context = LogContext::new(Default::default());
/// log_at!(context, LogLevel::Info, "listening on port", 8080);
/// ```
#[macro_export]
macro_rules! log_at {
    ($context:expr, $level:expr, $($arg:expr),+ $(,)?) => {{
        let context = &$context;
        let level = $level;
        if context.enabled(level) {
            context.log(level, $crate::join_args!($($arg),+));
        }
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($context:expr, $($arg:expr),+ $(,)?) => {
        $crate::log_at!($context, $crate::LogLevel::Debug, $($arg),+)
    };
}

#[macro_export]
macro_rules! log_info {
    ($context:expr, $($arg:expr),+ $(,)?) => {
        $crate::log_at!($context, $crate::LogLevel::Info, $($arg),+)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($context:expr, $($arg:expr),+ $(,)?) => {
        $crate::log_at!($context, $crate::LogLevel::Warn, $($arg),+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($context:expr, $($arg:expr),+ $(,)?) => {
        $crate::log_at!($context, $crate::LogLevel::Error, $($arg),+)
    };
}

#[macro_export]
macro_rules! log_fatal {
    ($context:expr, $($arg:expr),+ $(,)?) => {
        $crate::log_at!($context, $crate::LogLevel::Fatal, $($arg),+)
    };
}
