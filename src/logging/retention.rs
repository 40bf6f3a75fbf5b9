//! Log file retention management
//!
//! Periodically deletes rotated log files older than a maximum age. The
//! active dated file never matches the default pattern.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use regex::Regex;

use super::timer::IntervalTimer;

/// Default time between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// File names of rotated logs, e.g. `2024-05-01.log.3`
pub const ROTATED_FILE_PATTERN: &str = r"\d{4}-\d{2}-\d{2}\.log\.\d+";

/// Which files a sweep deletes
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Files last modified longer ago than this are deleted
    pub max_age: Duration,
    /// Anchored pattern a file name must match in full
    pub pattern: Regex,
    /// Directory swept recursively
    pub directory: PathBuf,
}

impl RetentionPolicy {
    /// Policy for rotated log files in `directory`
    pub fn rotated_logs(directory: impl Into<PathBuf>, max_age: Duration) -> Result<Self> {
        Self::with_pattern(directory, max_age, ROTATED_FILE_PATTERN)
    }

    /// Policy with a custom file name pattern
    pub fn with_pattern(
        directory: impl Into<PathBuf>,
        max_age: Duration,
        pattern: &str,
    ) -> Result<Self> {
        Ok(Self {
            max_age,
            pattern: full_match(pattern)?,
            directory: directory.into(),
        })
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.pattern.is_match(name))
    }
}

fn full_match(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern))
        .with_context(|| format!("Invalid retention pattern '{}'", pattern))
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files deleted
    pub deleted: Vec<PathBuf>,
    /// Expired files that could not be deleted
    pub failed: usize,
}

/// Delete every matching file older than the policy's max age
///
/// A file that cannot be inspected or removed is reported and skipped; the
/// sweep always visits the remaining files.
pub fn sweep(policy: &RetentionPolicy) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    if !policy.directory.exists() {
        return Ok(report);
    }

    let cutoff = SystemTime::now()
        .checked_sub(policy.max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    for path in regular_files(&policy.directory)? {
        if !policy.matches(&path) {
            continue;
        }

        let modified = match fs::metadata(&path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::warn!("Cannot read modification time of {}: {}", path.display(), e);
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => report.deleted.push(path),
            Err(e) => {
                tracing::warn!("Failed to remove old log file {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Regular files under `root`, recursively
///
/// Unreadable subdirectories are skipped; an unreadable root is an error.
fn regular_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir == root => {
                return Err(e).with_context(|| format!("Failed to read {}", root.display()));
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                continue;
            }
        };

        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}

/// Runs [`sweep`] right away and then on a fixed interval
pub struct RetentionSweeper {
    timer: IntervalTimer,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_SWEEP_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            timer: IntervalTimer::new("rotolog-retention"),
            interval,
        }
    }

    /// Start sweeping; returns `Ok(false)` if already running
    pub fn start(&self, policy: RetentionPolicy) -> Result<bool> {
        self.timer.start(self.interval, true, move || match sweep(&policy) {
            Ok(report) => {
                if !report.deleted.is_empty() {
                    tracing::info!("Cleaned up {} old log files", report.deleted.len());
                }
            }
            Err(e) => tracing::warn!("Log retention sweep failed: {:#}", e),
        })
    }

    pub fn stop(&self) -> bool {
        self.timer.stop()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }
}

impl Default for RetentionSweeper {
    fn default() -> Self {
        Self::new()
    }
}
