//! Value types used by the configuration file
//!
//! File sizes (`50MiB`), ages (`7d`) and times of day (`23:30`).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::Timelike;

use crate::error::ParseError;

/// Unit suffix of a [`FileSize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    B,
    KB,
    KiB,
    MB,
    MiB,
    GB,
    GiB,
}

impl SizeUnit {
    /// Number of bytes in one unit
    pub fn multiplier(&self) -> u64 {
        match self {
            SizeUnit::B => 1,
            SizeUnit::KB => 1_000,
            SizeUnit::KiB => 1_024,
            SizeUnit::MB => 1_000_000,
            SizeUnit::MiB => 1_048_576,
            SizeUnit::GB => 1_000_000_000,
            SizeUnit::GiB => 1_073_741_824,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeUnit::B => "B",
            SizeUnit::KB => "KB",
            SizeUnit::KiB => "KiB",
            SizeUnit::MB => "MB",
            SizeUnit::MiB => "MiB",
            SizeUnit::GB => "GB",
            SizeUnit::GiB => "GiB",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        let unit = match suffix {
            "B" => SizeUnit::B,
            "KB" => SizeUnit::KB,
            "KiB" => SizeUnit::KiB,
            "MB" => SizeUnit::MB,
            "MiB" => SizeUnit::MiB,
            "GB" => SizeUnit::GB,
            "GiB" => SizeUnit::GiB,
            _ => return None,
        };
        Some(unit)
    }
}

/// A file size as written in the configuration, e.g. `100KiB`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSize {
    pub size: u64,
    pub unit: SizeUnit,
}

impl FileSize {
    pub fn new(size: u64, unit: SizeUnit) -> Self {
        Self { size, unit }
    }

    /// Size in bytes
    pub fn bytes(&self) -> u64 {
        self.size.saturating_mul(self.unit.multiplier())
    }
}

impl Default for FileSize {
    fn default() -> Self {
        Self::new(50, SizeUnit::MB)
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.size, self.unit.as_str())
    }
}

impl FromStr for FileSize {
    type Err = ParseError;

    /// Parse `<int><unit>`; the unit is case-sensitive and the size must be positive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, suffix) = split_number(s);
        let size: u64 = digits
            .parse()
            .map_err(|_| ParseError::FileSize(s.to_string()))?;
        if size == 0 {
            return Err(ParseError::FileSize(s.to_string()));
        }
        let unit = SizeUnit::from_suffix(suffix).ok_or_else(|| ParseError::FileSize(s.to_string()))?;
        Ok(Self { size, unit })
    }
}

const SECOND_MS: u64 = 1_000;
const MINUTE_MS: u64 = 60 * SECOND_MS;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;
const WEEK_MS: u64 = 7 * DAY_MS;
// Average Gregorian month and year
const MONTH_MS: u64 = 2_629_746_000;
const YEAR_MS: u64 = 31_556_952_000;

/// Age units, largest first (used when rendering)
const AGE_UNITS: &[(char, u64)] = &[
    ('y', YEAR_MS),
    ('m', MONTH_MS),
    ('w', WEEK_MS),
    ('d', DAY_MS),
    ('H', HOUR_MS),
    ('M', MINUTE_MS),
    ('S', SECOND_MS),
];

/// Parse an age like `2d` or `36H`
///
/// Units: `S` seconds, `M` minutes, `H` hours, `d` days, `w` weeks,
/// `m` months, `y` years. A zero age is rejected.
pub fn parse_age(s: &str) -> Result<Duration, ParseError> {
    let s = s.trim();
    let (digits, suffix) = split_number(s);
    let count: u64 = digits.parse().map_err(|_| ParseError::Age(s.to_string()))?;

    let mut chars = suffix.chars();
    let unit_ms = match (chars.next(), chars.next()) {
        (Some(unit), None) => AGE_UNITS
            .iter()
            .find(|(c, _)| *c == unit)
            .map(|(_, ms)| *ms)
            .ok_or_else(|| ParseError::Age(s.to_string()))?,
        _ => return Err(ParseError::Age(s.to_string())),
    };

    match count.checked_mul(unit_ms) {
        Some(0) | None => Err(ParseError::Age(s.to_string())),
        Some(ms) => Ok(Duration::from_millis(ms)),
    }
}

/// Render an age with the largest unit that divides it exactly
///
/// Sub-second remainders are truncated.
pub fn format_age(age: Duration) -> String {
    let ms = age.as_millis() as u64;
    let ms = ms - ms % SECOND_MS;
    for (unit, unit_ms) in AGE_UNITS {
        if ms > 0 && ms % unit_ms == 0 {
            return format!("{}{}", ms / unit_ms, unit);
        }
    }
    "0S".to_string()
}

/// A wall-clock time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    /// Create a time of day, returning `None` when out of range
    pub fn new(hour: u8, minute: u8, second: u8) -> Option<Self> {
        if hour < 24 && minute < 60 && second < 60 {
            Some(Self {
                hour,
                minute,
                second,
            })
        } else {
            None
        }
    }

    /// Current local time of day
    pub fn now() -> Self {
        Self::from(chrono::Local::now().time())
    }
}

impl From<chrono::NaiveTime> for TimeOfDay {
    fn from(time: chrono::NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            // Leap seconds report 60
            second: time.second().min(59) as u8,
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl FromStr for TimeOfDay {
    type Err = ParseError;

    /// Parse `H:M` or `H:M:S`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::TimeOfDay(s.to_string());
        let fields = s
            .trim()
            .split(':')
            .map(|field| field.trim().parse::<u8>().map_err(|_| err()))
            .collect::<Result<Vec<_>, _>>()?;
        let (hour, minute, second) = match fields[..] {
            [hour, minute] => (hour, minute, 0),
            [hour, minute, second] => (hour, minute, second),
            _ => return Err(err()),
        };
        TimeOfDay::new(hour, minute, second).ok_or_else(err)
    }
}

fn split_number(s: &str) -> (&str, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_size() {
        let size: FileSize = "50MiB".parse().unwrap();
        assert_eq!(size, FileSize::new(50, SizeUnit::MiB));
        assert_eq!(size.bytes(), 50 * 1_048_576);

        assert_eq!("100B".parse::<FileSize>().unwrap().bytes(), 100);
        assert_eq!("2KB".parse::<FileSize>().unwrap().bytes(), 2_000);
        assert_eq!("1GiB".parse::<FileSize>().unwrap().bytes(), 1_073_741_824);
    }

    #[test]
    fn test_parse_file_size_rejects_bad_input() {
        assert!("".parse::<FileSize>().is_err());
        assert!("50".parse::<FileSize>().is_err());
        assert!("MB".parse::<FileSize>().is_err());
        assert!("0MB".parse::<FileSize>().is_err());
        assert!("50mb".parse::<FileSize>().is_err());
        assert!("50TB".parse::<FileSize>().is_err());
    }

    #[test]
    fn test_file_size_display() {
        assert_eq!(FileSize::default().to_string(), "50MB");
        assert_eq!(FileSize::new(7, SizeUnit::KiB).to_string(), "7KiB");
    }

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age("30S").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_age("5M").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_age("2H").unwrap(), Duration::from_secs(7_200));
        assert_eq!(parse_age("1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_age("1w").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_age("1m").unwrap(), Duration::from_millis(MONTH_MS));
        assert_eq!(parse_age("1y").unwrap(), Duration::from_millis(YEAR_MS));
    }

    #[test]
    fn test_parse_age_rejects_bad_input() {
        assert!(parse_age("d").is_err());
        assert!(parse_age("0d").is_err());
        assert!(parse_age("3").is_err());
        assert!(parse_age("3x").is_err());
        assert!(parse_age("3dd").is_err());
    }

    #[test]
    fn test_format_age_uses_largest_exact_unit() {
        assert_eq!(format_age(Duration::from_secs(86_400)), "1d");
        assert_eq!(format_age(Duration::from_secs(90_000)), "25H");
        assert_eq!(format_age(Duration::from_secs(90)), "90S");
        assert_eq!(format_age(Duration::from_secs(1_209_600)), "2w");
        assert_eq!(format_age(Duration::ZERO), "0S");

        for text in ["3d", "1y", "2m", "45M", "7S"] {
            assert_eq!(format_age(parse_age(text).unwrap()), text);
        }
    }

    #[test]
    fn test_parse_time_of_day() {
        let time: TimeOfDay = "11:45".parse().unwrap();
        assert_eq!(time, TimeOfDay::new(11, 45, 0).unwrap());
        assert_eq!("0:5".parse::<TimeOfDay>().unwrap().to_string(), "00:05:00");

        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("12".parse::<TimeOfDay>().is_err());
        assert!("-1:30".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_parse_time_of_day_with_seconds() {
        let time: TimeOfDay = "23:30:15".parse().unwrap();
        assert_eq!(time, TimeOfDay::new(23, 30, 15).unwrap());

        assert!("11:45:junk".parse::<TimeOfDay>().is_err());
        assert!("11:45:00:00".parse::<TimeOfDay>().is_err());
        assert!("11:45:junk:more".parse::<TimeOfDay>().is_err());
        assert!("11:45:60".parse::<TimeOfDay>().is_err());
        assert!("11:".parse::<TimeOfDay>().is_err());
    }
}
