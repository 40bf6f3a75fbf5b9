//! Asynchronous logging for rotolog
//!
//! Callers enqueue rendered lines; a single worker thread writes them to the
//! console or a dated log file. Optional watcher threads rotate the file by
//! size or time of day and delete old rotated files.

mod context;
mod level;
mod queue;
mod record;
mod retention;
mod rotation;
mod sink;
mod timer;
mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{ContextOptions, LogContext};
pub use level::{LogLevel, LogMode};
pub use queue::MessageQueue;
pub use record::{LogRecord, TIMESTAMP_FORMAT};
pub use retention::{
    sweep, RetentionPolicy, RetentionSweeper, SweepReport, DEFAULT_SWEEP_INTERVAL,
    ROTATED_FILE_PATTERN,
};
pub use rotation::{RotationPolicy, RotationTrigger, RotationWatcher, DEFAULT_CHECK_INTERVAL};
pub use sink::{dated_file_name, next_rotation_suffix, ConsoleWriterFactory, SinkManager};
pub use timer::IntervalTimer;
pub use worker::{LogWorker, DEFAULT_POLL_INTERVAL};
