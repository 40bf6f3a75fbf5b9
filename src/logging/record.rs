//! A single log record and its rendered line

use chrono::{DateTime, Local};

use super::level::LogLevel;

/// Timestamp format used in every rendered line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A log message captured at the call site
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Local time when the record was created
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub body: String,
}

impl LogRecord {
    /// Create a record stamped with the current local time
    pub fn new(level: LogLevel, body: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            body: body.into(),
        }
    }

    /// Render as `[LEVEL] YYYY-MM-DD HH:MM:SS - body`
    pub fn render(&self) -> String {
        format!(
            "[{}] {} - {}",
            self.level.as_str(),
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.body
        )
    }
}

/// Join the `Display` form of each argument with single spaces
///
/// ```
/// assert_eq!(rotolog::join_args!("took", 12, "ms"), "took 12 ms");
/// ```
#[macro_export]
macro_rules! join_args {
    ($($arg:expr),+ $(,)?) => {{
        let parts: ::std::vec::Vec<::std::string::String> =
            ::std::vec![$(::std::string::ToString::to_string(&$arg)),+];
        parts.join(" ")
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_render_format() {
        let record = LogRecord {
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap(),
            level: LogLevel::Warn,
            body: "disk almost full".to_string(),
        };
        assert_eq!(record.render(), "[WARN] 2024-03-09 07:05:01 - disk almost full");
    }

    #[test]
    fn test_render_matches_shape() {
        let line = LogRecord::new(LogLevel::Info, "Test log").render();
        let pattern =
            regex::Regex::new(r"^\[INFO\] \d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} - Test log$").unwrap();
        assert!(pattern.is_match(&line), "unexpected line: {}", line);
    }

    #[test]
    fn test_join_args() {
        assert_eq!(crate::join_args!("a"), "a");
        assert_eq!(crate::join_args!("user", 42, "logged in", true), "user 42 logged in true");
        assert_eq!(crate::join_args!(1.5, 'x',), "1.5 x");
    }
}
