//! Line-oriented key/value store backing the configuration file
//!
//! Each line is `KEY value`. Values are one of a closed set of scalar kinds,
//! inferred when reading: all digits is an integer, `true`/`false` (any case)
//! is a boolean, anything else is a string.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::StoreError;

/// Kind tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Int,
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Str => "string",
            ValueKind::Int => "integer",
            ValueKind::Bool => "boolean",
        };
        f.write_str(name)
    }
}

/// A stored scalar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::Int(_) => ValueKind::Int,
            Value::Bool(_) => ValueKind::Bool,
        }
    }

    /// Infer the value kind from its textual form
    ///
    /// Only digit strings that render back unchanged become `Int`, so text
    /// such as `007` stays a string. A `Str` holding such digits is read
    /// back as `Int`; its `Display` form is the same either way.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let canonical = text == "0" || !text.starts_with('0');
        if canonical && !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = text.parse() {
                return Value::Int(n);
            }
        }
        if text.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        Value::Str(text.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// String-keyed store of scalar values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueStore {
    values: BTreeMap<String, Value>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous one for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Get a string value
    pub fn get_str(&self, key: &str) -> Result<&str, StoreError> {
        match self.lookup(key)? {
            Value::Str(s) => Ok(s),
            other => Err(mismatch(key, ValueKind::Str, other)),
        }
    }

    /// Get an integer value
    pub fn get_int(&self, key: &str) -> Result<i64, StoreError> {
        match self.lookup(key)? {
            Value::Int(n) => Ok(*n),
            other => Err(mismatch(key, ValueKind::Int, other)),
        }
    }

    /// Get a boolean value
    pub fn get_bool(&self, key: &str) -> Result<bool, StoreError> {
        match self.lookup(key)? {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch(key, ValueKind::Bool, other)),
        }
    }

    fn lookup(&self, key: &str) -> Result<&Value, StoreError> {
        self.values
            .get(key)
            .ok_or_else(|| StoreError::Missing(key.to_string()))
    }

    /// Parse store content, skipping blank lines and `#` comments
    ///
    /// A line without a value is reported and skipped.
    pub fn parse(content: &str) -> Self {
        let mut store = Self::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once(char::is_whitespace) {
                Some((key, value)) if !value.trim().is_empty() => {
                    store.insert(key, Value::parse(value));
                }
                _ => {
                    tracing::warn!("Ignoring line {} without a value: {}", number + 1, line);
                }
            }
        }
        store
    }

    /// Render the whole store, one `KEY value` line per entry
    pub fn render(&self) -> String {
        self.values
            .iter()
            .map(|(key, value)| format!("{} {}\n", key, value))
            .collect()
    }

    /// Load a store from a file
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Write the whole store to a file, replacing its content
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Append a single key to an existing file
    pub fn append(&self, path: &Path, key: &str) -> Result<()> {
        let value = self.lookup(key)?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {} for append", path.display()))?;
        writeln!(file, "{} {}", key, value)
            .with_context(|| format!("Failed to append to {}", path.display()))
    }
}

fn mismatch(key: &str, expected: ValueKind, found: &Value) -> StoreError {
    StoreError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}
