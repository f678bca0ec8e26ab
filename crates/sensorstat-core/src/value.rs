//! Cell values read out of a record by column

use chrono::{DateTime, Utc};
use std::fmt;

use crate::time::format_timestamp;

/// A single cell of a sensor reading
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", format_timestamp(ts)),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}
