//! Typed errors for contract violations
//!
//! Operational failures (I/O on the sink, sweeps) are reported through
//! `tracing` and `anyhow`; the errors here are the ones a caller is expected
//! to match on.

use thiserror::Error;

use crate::config::store::ValueKind;

/// Errors raised by the configuration value store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key is not present in the store
    #[error("no value stored for key '{0}'")]
    Missing(String),

    /// The stored value has a different kind than the one requested
    #[error("key '{key}' holds a {found} value, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Errors raised when parsing a configuration value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid file size '{0}'")]
    FileSize(String),

    #[error("invalid age '{0}'")]
    Age(String),

    #[error("invalid time of day '{0}'")]
    TimeOfDay(String),

    #[error("unknown log level '{0}'")]
    Level(String),

    #[error("unknown log mode '{0}'")]
    Mode(String),
}
