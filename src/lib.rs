//! rotolog - asynchronous logging with file rotation and retention
//!
//! Log calls render a line and push it onto a queue; a background worker
//! writes queued lines to the console or to a dated file in the log
//! directory. Optional watchers rotate the file by size or time of day and
//! delete rotated files past a maximum age.

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{ParseError, StoreError};
pub use logging::{LogContext, LogLevel, LogMode};
