//! Output sink management
//!
//! Owns the active output (a console writer or an open dated log file) and
//! swaps it when the log file is rotated. All access to the handle goes
//! through one lock, so a rotation waits for the write in flight to finish
//! before closing the old file, and the new file becomes visible only after
//! the swap is complete.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};

use super::level::LogMode;

/// Extension of the active log file
pub const LOG_FILE_EXTENSION: &str = "log";

/// Builds the writer used in console mode
pub type ConsoleWriterFactory = Box<dyn Fn() -> Box<dyn Write + Send> + Send + Sync>;

/// Name of the active log file for a given day (`YYYY-MM-DD.log`)
pub fn dated_file_name(date: NaiveDate) -> String {
    format!("{}.{}", date.format("%Y-%m-%d"), LOG_FILE_EXTENSION)
}

/// Lowest `n >= 1` such that `<file_name>.<n>` does not exist in `dir`
pub fn next_rotation_suffix(dir: &Path, file_name: &str) -> u32 {
    (1..)
        .find(|n| !dir.join(format!("{}.{}", file_name, n)).exists())
        .unwrap_or(u32::MAX)
}

/// The active output
enum Sink {
    Console(Box<dyn Write + Send>),
    File { path: PathBuf, file: File },
}

impl Sink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let writer: &mut dyn Write = match self {
            Sink::Console(writer) => writer.as_mut(),
            Sink::File { file, .. } => file,
        };
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    fn close(self) {
        match self {
            Sink::Console(mut writer) => {
                let _ = writer.flush();
            }
            Sink::File { path, mut file } => {
                if let Err(e) = file.flush() {
                    tracing::warn!("Failed to flush {} on close: {}", path.display(), e);
                }
            }
        }
    }
}

#[derive(Default)]
struct SinkState {
    mode: Option<LogMode>,
    sink: Option<Sink>,
    /// Directory of the last file opened, used to recover a lost handle
    directory: Option<PathBuf>,
}

/// Owns the active sink and performs open, close and rotation
pub struct SinkManager {
    state: Mutex<SinkState>,
    current_path: Mutex<Option<PathBuf>>,
    paused: AtomicBool,
    generation: AtomicU64,
    make_console: ConsoleWriterFactory,
}

/// Clears the pause flag when the swap ends, including on error
struct PauseGuard<'a>(&'a AtomicBool);

impl<'a> PauseGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SinkManager {
    /// Create a manager whose console mode writes to stdout
    pub fn new() -> Self {
        Self::with_console(Box::new(|| Box::new(io::stdout())))
    }

    /// Create a manager with a custom console writer
    pub fn with_console(make_console: ConsoleWriterFactory) -> Self {
        Self {
            state: Mutex::new(SinkState::default()),
            current_path: Mutex::new(None),
            paused: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            make_console,
        }
    }

    /// Open the sink for `mode`, replacing whatever was active
    ///
    /// In file mode the directory is created if needed and today's file is
    /// opened for append. The process's own stdout is never redirected. The
    /// new output is opened before the old one is closed, so on error the
    /// previous sink stays active.
    pub fn initialize(&self, mode: LogMode, directory: &Path) -> Result<()> {
        let (sink, path) = match mode {
            LogMode::Console => (Sink::Console((self.make_console)()), None),
            LogMode::File => {
                let path = directory.join(dated_file_name(Local::now().date_naive()));
                let file = open_log_file(directory, &path)?;
                (
                    Sink::File {
                        path: path.clone(),
                        file,
                    },
                    Some(path),
                )
            }
        };

        let _pause = PauseGuard::raise(&self.paused);
        let mut state = self.lock_state();
        if let Some(old) = state.sink.replace(sink) {
            old.close();
        }
        state.mode = Some(mode);
        state.directory = path.as_ref().map(|_| directory.to_path_buf());
        self.set_current_path(path);
        self.generation.fetch_add(1, Ordering::AcqRel);

        tracing::debug!("Sink initialized in {} mode", mode);
        Ok(())
    }

    /// Close the current log file and start a fresh one for today
    ///
    /// An existing file with today's name is renamed to `<name>.<n>` first;
    /// if that rename fails, logging continues in the existing file. If the
    /// new file cannot be opened, the next write retries in the directory of
    /// the last file that did open. Does nothing unless the sink is in file
    /// mode.
    pub fn reopen(&self, directory: &Path) -> Result<()> {
        let _pause = PauseGuard::raise(&self.paused);
        // Taking the lock waits for any write in flight
        let mut state = self.lock_state();
        if state.mode != Some(LogMode::File) {
            return Ok(());
        }

        if let Some(old) = state.sink.take() {
            old.close();
        }

        let file_name = dated_file_name(Local::now().date_naive());
        let path = directory.join(&file_name);

        if path.exists() {
            let suffix = next_rotation_suffix(directory, &file_name);
            let rotated = directory.join(format!("{}.{}", file_name, suffix));
            match fs::rename(&path, &rotated) {
                Ok(()) => tracing::debug!("Rotated {} to {}", path.display(), rotated.display()),
                Err(e) => tracing::warn!(
                    "Failed to rename {} to {}, appending to it instead: {}",
                    path.display(),
                    rotated.display(),
                    e
                ),
            }
        }

        let file = open_log_file(directory, &path)?;
        self.set_current_path(Some(path.clone()));
        state.sink = Some(Sink::File { path, file });
        state.directory = Some(directory.to_path_buf());
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Write one line followed by a newline to the active sink
    ///
    /// In file mode a handle lost to a failed reopen is opened again first.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut state = self.lock_state();
        if state.sink.is_none() {
            self.recover(&mut state)?;
        }
        match state.sink.as_mut() {
            Some(sink) => sink.write_line(line),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no active log sink",
            )),
        }
    }

    /// Close the active sink; later writes fail until re-initialized
    pub fn close(&self) {
        let mut state = self.lock_state();
        if let Some(old) = state.sink.take() {
            old.close();
        }
        state.mode = None;
        state.directory = None;
        self.set_current_path(None);
    }

    /// Mode of the active sink, `None` before initialization or after close
    pub fn mode(&self) -> Option<LogMode> {
        self.lock_state().mode
    }

    /// Path of the open log file in file mode
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current_path
            .lock()
            .map(|path| path.clone())
            .unwrap_or_default()
    }

    /// Size on disk of the open log file
    pub fn current_size(&self) -> Option<u64> {
        let path = self.current_path()?;
        fs::metadata(path).ok().map(|meta| meta.len())
    }

    /// Whether a swap is in progress
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Number of completed opens and swaps
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn recover(&self, state: &mut SinkState) -> io::Result<()> {
        let (Some(LogMode::File), Some(directory)) = (state.mode, state.directory.clone()) else {
            return Ok(());
        };
        let path = directory.join(dated_file_name(Local::now().date_naive()));
        let file = open_log_file(&directory, &path)
            .map_err(|e| io::Error::other(format!("{:#}", e)))?;

        tracing::info!("Reopened log file {}", path.display());
        self.set_current_path(Some(path.clone()));
        state.sink = Some(Sink::File { path, file });
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, SinkState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_current_path(&self, path: Option<PathBuf>) {
        if let Ok(mut current) = self.current_path.lock() {
            *current = path;
        }
    }
}

impl Default for SinkManager {
    fn default() -> Self {
        Self::new()
    }
}

fn open_log_file(directory: &Path, path: &Path) -> Result<File> {
    fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
