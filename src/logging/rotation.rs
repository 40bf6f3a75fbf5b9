//! Size and checkpoint driven rotation of the active log file
//!
//! The watcher polls on a fixed interval, so a file can grow past the
//! configured maximum by whatever is written during one interval before it
//! is rotated.

use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDate, NaiveDateTime};

use super::timer::IntervalTimer;
use crate::config::units::{FileSize, TimeOfDay};

/// Default time between rotation checks
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// When the active log file should be rotated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationPolicy {
    /// Rotate once the file is larger than this
    pub max_size: FileSize,
    /// Rotate once a day at this time
    pub check_point: Option<TimeOfDay>,
}

/// Reason a rotation was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationTrigger {
    CheckPoint,
    MaxSize,
}

impl RotationPolicy {
    /// Decide which rotations one tick should request
    ///
    /// The checkpoint fires at most once per day: on the first tick at or
    /// past the checkpoint on a day other than `last_check_point`. Both
    /// triggers can fire on the same tick.
    pub fn evaluate(
        &self,
        now: NaiveDateTime,
        current_size: Option<u64>,
        last_check_point: Option<NaiveDate>,
    ) -> Vec<RotationTrigger> {
        let mut triggers = Vec::new();
        if let Some(check_point) = self.check_point {
            let due = TimeOfDay::from(now.time()) >= check_point;
            if due && last_check_point != Some(now.date()) {
                triggers.push(RotationTrigger::CheckPoint);
            }
        }
        if current_size.is_some_and(|size| size > self.max_size.bytes()) {
            triggers.push(RotationTrigger::MaxSize);
        }
        triggers
    }

    /// Day the checkpoint counts as already handled when watching starts
    ///
    /// A checkpoint whose minute is over has passed for today; one in the
    /// current minute still fires.
    pub fn initial_check_point(&self, now: NaiveDateTime) -> Option<NaiveDate> {
        let check_point = self.check_point?;
        let now_time = TimeOfDay::from(now.time());
        let passed = (now_time.hour, now_time.minute) > (check_point.hour, check_point.minute);
        passed.then(|| now.date())
    }
}

/// Polls the active file and calls back when it should be rotated
pub struct RotationWatcher {
    timer: IntervalTimer,
    interval: Duration,
}

impl RotationWatcher {
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_CHECK_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            timer: IntervalTimer::new("rotolog-rotation"),
            interval,
        }
    }

    /// Start watching
    ///
    /// `current_size` reports the active file size on each tick and `reopen`
    /// is invoked once per trigger. Returns `Ok(false)` if already running.
    pub fn start<S, R>(&self, policy: RotationPolicy, current_size: S, reopen: R) -> Result<bool>
    where
        S: Fn() -> Option<u64> + Send + 'static,
        R: Fn() + Send + 'static,
    {
        let mut last_check_point = policy.initial_check_point(Local::now().naive_local());
        self.timer.start(self.interval, false, move || {
            let now = Local::now().naive_local();
            for trigger in policy.evaluate(now, current_size(), last_check_point) {
                if trigger == RotationTrigger::CheckPoint {
                    last_check_point = Some(now.date());
                }
                tracing::debug!("Rotating log file ({:?})", trigger);
                reopen();
            }
        })
    }

    pub fn stop(&self) -> bool {
        self.timer.stop()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }
}

impl Default for RotationWatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::SizeUnit;
    use crate::logging::level::LogMode;
    use crate::logging::sink::{dated_file_name, SinkManager};
    use crate::logging::test_support::eventually;
    use chrono::Local;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn check_point(hour: u8, minute: u8) -> Option<TimeOfDay> {
        TimeOfDay::new(hour, minute, 0)
    }

    #[test]
    fn test_evaluate_size_threshold() {
        let policy = RotationPolicy {
            max_size: FileSize::new(100, SizeUnit::B),
            check_point: None,
        };
        let now = at(12, 0, 0);
        assert!(policy.evaluate(now, Some(80), None).is_empty());
        assert!(policy.evaluate(now, Some(100), None).is_empty());
        assert_eq!(
            policy.evaluate(now, Some(120), None),
            vec![RotationTrigger::MaxSize]
        );
        assert!(policy.evaluate(now, None, None).is_empty());
    }

    #[test]
    fn test_evaluate_check_point_fires_once_per_day() {
        let policy = RotationPolicy {
            max_size: FileSize::default(),
            check_point: check_point(23, 30),
        };
        let today = at(0, 0, 0).date();

        assert!(policy.evaluate(at(23, 29, 59), Some(0), None).is_empty());
        assert_eq!(
            policy.evaluate(at(23, 30, 42), Some(0), None),
            vec![RotationTrigger::CheckPoint]
        );
        assert!(policy.evaluate(at(23, 30, 50), Some(0), Some(today)).is_empty());

        // Fired yesterday, due again today
        let yesterday = today.pred_opt().unwrap();
        assert_eq!(
            policy.evaluate(at(23, 30, 0), Some(0), Some(yesterday)),
            vec![RotationTrigger::CheckPoint]
        );
    }

    #[test]
    fn test_evaluate_check_point_after_missed_minute() {
        let policy = RotationPolicy {
            max_size: FileSize::default(),
            check_point: check_point(6, 0),
        };
        assert_eq!(
            policy.evaluate(at(6, 1, 3), Some(0), None),
            vec![RotationTrigger::CheckPoint]
        );
    }

    #[test]
    fn test_initial_check_point() {
        let policy = RotationPolicy {
            max_size: FileSize::default(),
            check_point: check_point(12, 0),
        };
        let today = at(0, 0, 0).date();
        assert_eq!(policy.initial_check_point(at(11, 59, 59)), None);
        assert_eq!(policy.initial_check_point(at(12, 0, 30)), None);
        assert_eq!(policy.initial_check_point(at(12, 1, 0)), Some(today));
        assert_eq!(RotationPolicy::default().initial_check_point(at(12, 1, 0)), None);
    }

    #[test]
    fn test_evaluate_both_triggers() {
        let policy = RotationPolicy {
            max_size: FileSize::new(1, SizeUnit::KB),
            check_point: check_point(6, 0),
        };
        assert_eq!(
            policy.evaluate(at(6, 0, 10), Some(5_000), None),
            vec![RotationTrigger::CheckPoint, RotationTrigger::MaxSize]
        );
    }

    #[test]
    fn test_watcher_rotates_once_at_check_point() {
        let watcher = RotationWatcher::with_interval(Duration::from_millis(10));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let now = TimeOfDay::now();
        let policy = RotationPolicy {
            max_size: FileSize::default(),
            check_point: TimeOfDay::new(now.hour, now.minute, 0),
        };

        watcher
            .start(policy, || Some(0), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(eventually(|| calls.load(Ordering::SeqCst) >= 1));
        thread::sleep(Duration::from_millis(300));
        watcher.stop();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_watcher_calls_reopen_when_oversized() {
        let watcher = RotationWatcher::with_interval(Duration::from_millis(10));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let policy = RotationPolicy {
            max_size: FileSize::new(10, SizeUnit::B),
            check_point: None,
        };

        assert!(watcher
            .start(policy, || Some(11), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap());
        assert!(eventually(|| calls.load(Ordering::SeqCst) >= 2));
        assert!(watcher.stop());
    }

    #[test]
    fn test_watcher_start_is_idempotent() {
        let watcher = RotationWatcher::with_interval(Duration::from_secs(3600));
        let policy = RotationPolicy::default();
        assert!(watcher.start(policy, || None, || {}).unwrap());
        assert!(!watcher.start(policy, || None, || {}).unwrap());
        assert!(watcher.is_running());
        watcher.stop();
        assert!(!watcher.is_running());
    }

    #[test]
    fn test_rotates_file_after_it_exceeds_max_size() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        let sink = Arc::new(SinkManager::new());
        sink.initialize(LogMode::File, &dir).unwrap();

        // 19 characters plus the newline: 20 bytes per message
        for i in 0..6 {
            sink.write_line(&format!("message number {:04}", i)).unwrap();
        }
        assert_eq!(sink.current_size(), Some(120));
        let generation = sink.generation();

        let watcher = RotationWatcher::with_interval(Duration::from_millis(10));
        let policy = RotationPolicy {
            max_size: FileSize::new(100, SizeUnit::B),
            check_point: None,
        };
        let size_sink = Arc::clone(&sink);
        let reopen_sink = Arc::clone(&sink);
        let reopen_dir = dir.clone();
        watcher
            .start(policy, move || size_sink.current_size(), move || {
                reopen_sink.reopen(&reopen_dir).unwrap();
            })
            .unwrap();

        assert!(eventually(|| sink.generation() > generation));
        watcher.stop();

        let name = dated_file_name(Local::now().date_naive());
        let rotated = fs::metadata(dir.join(format!("{}.1", name))).unwrap();
        assert!(rotated.len() >= 100);
        assert_eq!(fs::metadata(dir.join(&name)).unwrap().len(), 0);
        // The fresh file is under the limit, so no further rotation happened
        assert!(!dir.join(format!("{}.2", name)).exists());
    }
}
