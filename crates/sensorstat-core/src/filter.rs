//! Filter conditions over sensor readings
//!
//! A condition names a column and carries a typed predicate. String columns
//! only support exact (case-sensitive) equality and inequality; the ordering
//! comparisons apply to the `time` column.
//!
//! ```rust
//! use sensorstat_core::filter::{FilterCondition, Predicate};
//!
//! let cond = FilterCondition::parse("time", ">=", "2025-01-03").unwrap();
//! assert!(matches!(cond.predicate, Predicate::TimeAtOrAfter(_)));
//!
//! let cond = FilterCondition::parse("site", "==", "site_1").unwrap();
//! assert_eq!(cond.predicate, Predicate::StrEq("site_1".into()));
//! ```

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::record::{Column, Record, Schema};
use crate::time::{format_timestamp, parse_timestamp};

/// Comparison operator as written in a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    pub fn is_ordering(&self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

impl FromStr for CompareOp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "==" | "=" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::Ne),
            "<" => Ok(CompareOp::Lt),
            "<=" => Ok(CompareOp::Le),
            ">" => Ok(CompareOp::Gt),
            ">=" => Ok(CompareOp::Ge),
            other => Err(CoreError::InvalidOperator(other.to_string())),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Typed predicate of a filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    StrEq(String),
    StrNe(String),
    TimeEq(DateTime<Utc>),
    TimeNe(DateTime<Utc>),
    TimeBefore(DateTime<Utc>),
    TimeAtOrBefore(DateTime<Utc>),
    TimeAfter(DateTime<Utc>),
    TimeAtOrAfter(DateTime<Utc>),
}

impl Predicate {
    pub fn op(&self) -> CompareOp {
        match self {
            Predicate::StrEq(_) | Predicate::TimeEq(_) => CompareOp::Eq,
            Predicate::StrNe(_) | Predicate::TimeNe(_) => CompareOp::Ne,
            Predicate::TimeBefore(_) => CompareOp::Lt,
            Predicate::TimeAtOrBefore(_) => CompareOp::Le,
            Predicate::TimeAfter(_) => CompareOp::Gt,
            Predicate::TimeAtOrAfter(_) => CompareOp::Ge,
        }
    }

    fn is_string(&self) -> bool {
        matches!(self, Predicate::StrEq(_) | Predicate::StrNe(_))
    }

    /// Whether this predicate can be evaluated against `column`.
    pub fn applies_to(&self, column: Column) -> bool {
        if self.is_string() {
            column.is_string()
        } else {
            column == Column::Time
        }
    }

    pub fn matches_str(&self, actual: &str) -> bool {
        match self {
            Predicate::StrEq(expected) => actual == expected,
            Predicate::StrNe(expected) => actual != expected,
            _ => false,
        }
    }

    pub fn matches_time(&self, actual: &DateTime<Utc>) -> bool {
        match self {
            Predicate::TimeEq(t) => actual == t,
            Predicate::TimeNe(t) => actual != t,
            Predicate::TimeBefore(t) => actual < t,
            Predicate::TimeAtOrBefore(t) => actual <= t,
            Predicate::TimeAfter(t) => actual > t,
            Predicate::TimeAtOrAfter(t) => actual >= t,
            Predicate::StrEq(_) | Predicate::StrNe(_) => false,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::StrEq(s) | Predicate::StrNe(s) => write!(f, "{} \"{}\"", self.op(), s),
            Predicate::TimeEq(t)
            | Predicate::TimeNe(t)
            | Predicate::TimeBefore(t)
            | Predicate::TimeAtOrBefore(t)
            | Predicate::TimeAfter(t)
            | Predicate::TimeAtOrAfter(t) => {
                write!(f, "{} {}", self.op(), format_timestamp(t))
            }
        }
    }
}

/// One `key <op> operand` condition; a list of them is combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub key: String,
    pub predicate: Predicate,
}

impl FilterCondition {
    pub fn new(key: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            key: key.into(),
            predicate,
        }
    }

    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, Predicate::StrEq(value.into()))
    }

    pub fn not_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, Predicate::StrNe(value.into()))
    }

    /// Inclusive lower bound on the `time` column.
    pub fn time_at_or_after(ts: DateTime<Utc>) -> Self {
        Self::new(Column::Time.name(), Predicate::TimeAtOrAfter(ts))
    }

    /// Inclusive upper bound on the `time` column.
    pub fn time_at_or_before(ts: DateTime<Utc>) -> Self {
        Self::new(Column::Time.name(), Predicate::TimeAtOrBefore(ts))
    }

    /// Build a condition from its textual parts.
    ///
    /// Ordering operators and any comparison on `time` take a timestamp
    /// operand; equality on other keys keeps the operand as a string.
    /// The key itself is not checked here, only when the condition is bound
    /// to a batch schema.
    pub fn parse(key: &str, op: &str, operand: &str) -> CoreResult<Self> {
        let op: CompareOp = op.parse()?;
        let timed = op.is_ordering() || key == Column::Time.name();

        let predicate = if timed {
            let ts = parse_timestamp(operand)?;
            match op {
                CompareOp::Eq => Predicate::TimeEq(ts),
                CompareOp::Ne => Predicate::TimeNe(ts),
                CompareOp::Lt => Predicate::TimeBefore(ts),
                CompareOp::Le => Predicate::TimeAtOrBefore(ts),
                CompareOp::Gt => Predicate::TimeAfter(ts),
                CompareOp::Ge => Predicate::TimeAtOrAfter(ts),
            }
        } else if op == CompareOp::Eq {
            Predicate::StrEq(operand.to_string())
        } else {
            Predicate::StrNe(operand.to_string())
        };

        Ok(Self::new(key, predicate))
    }

    /// Resolve the key against `schema` and check the predicate fits the column.
    pub fn bind(&self, schema: &Schema) -> CoreResult<BoundCondition<'_>> {
        let column = schema.resolve(&self.key)?;
        if !self.predicate.applies_to(column) {
            return Err(CoreError::OperandMismatch {
                column: column.name().to_string(),
                predicate: self.predicate.to_string(),
            });
        }
        Ok(BoundCondition {
            column,
            predicate: &self.predicate,
        })
    }
}

impl fmt::Display for FilterCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.predicate)
    }
}

/// A condition whose column has been resolved against a schema
#[derive(Debug, Clone, Copy)]
pub struct BoundCondition<'a> {
    column: Column,
    predicate: &'a Predicate,
}

impl BoundCondition<'_> {
    pub fn column(&self) -> Column {
        self.column
    }

    pub fn matches(&self, record: &Record) -> bool {
        if self.column == Column::Time {
            self.predicate.matches_time(&record.time)
        } else {
            record
                .str_field(self.column)
                .is_some_and(|s| self.predicate.matches_str(s))
        }
    }
}
