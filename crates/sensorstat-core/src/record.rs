//! Sensor readings and the batches they travel in

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::value::Value;

/// A column of the sensor reading table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Time,
    Site,
    Device,
    Metric,
    Unit,
    Value,
}

impl Column {
    /// All columns in source-file order.
    pub const ALL: [Column; 6] = [
        Column::Time,
        Column::Site,
        Column::Device,
        Column::Metric,
        Column::Unit,
        Column::Value,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Time => "time",
            Column::Site => "site",
            Column::Device => "device",
            Column::Metric => "metric",
            Column::Unit => "unit",
            Column::Value => "value",
        }
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Low-cardinality string attribute (site, device, metric, unit).
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            Column::Site | Column::Device | Column::Metric | Column::Unit
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered set of columns carried by a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let mut deduped: Vec<Column> = Vec::with_capacity(columns.len());
        for column in columns {
            if !deduped.contains(&column) {
                deduped.push(column);
            }
        }
        Self { columns: deduped }
    }

    /// The full six-column reading schema.
    pub fn sensor() -> Self {
        Self::new(Column::ALL.to_vec())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn contains(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Look a column up by name; fails if the name is not part of this schema.
    pub fn resolve(&self, name: &str) -> CoreResult<Column> {
        Column::from_name(name)
            .filter(|c| self.contains(*c))
            .ok_or_else(|| CoreError::UnknownColumn(name.to_string()))
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::sensor()
    }
}

/// One time-stamped sensor reading
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub site: String,
    pub device: String,
    pub metric: String,
    pub unit: String,
    pub value: f64,
}

impl Record {
    pub fn new(
        time: DateTime<Utc>,
        site: impl Into<String>,
        device: impl Into<String>,
        metric: impl Into<String>,
        unit: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            time,
            site: site.into(),
            device: device.into(),
            metric: metric.into(),
            unit: unit.into(),
            value,
        }
    }

    /// Borrow a string attribute; `None` for `time` and `value`.
    pub fn str_field(&self, column: Column) -> Option<&str> {
        match column {
            Column::Site => Some(&self.site),
            Column::Device => Some(&self.device),
            Column::Metric => Some(&self.metric),
            Column::Unit => Some(&self.unit),
            Column::Time | Column::Value => None,
        }
    }

    pub fn get(&self, column: Column) -> Value {
        match column {
            Column::Time => Value::Timestamp(self.time),
            Column::Value => Value::Float(self.value),
            Column::Site => Value::from(self.site.as_str()),
            Column::Device => Value::from(self.device.as_str()),
            Column::Metric => Value::from(self.metric.as_str()),
            Column::Unit => Value::from(self.unit.as_str()),
        }
    }
}

/// A bounded batch of readings sharing one schema
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    schema: Arc<Schema>,
    rows: Vec<Record>,
}

impl RecordBatch {
    pub fn new(schema: Arc<Schema>, rows: Vec<Record>) -> Self {
        Self { schema, rows }
    }

    /// Batch over the full reading schema.
    pub fn from_records(rows: Vec<Record>) -> Self {
        Self::new(Arc::new(Schema::sensor()), rows)
    }

    pub fn empty(schema: Arc<Schema>) -> Self {
        Self::new(schema, Vec::new())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_ref(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    /// New batch holding the rows for which `keep` is true.
    pub fn filter_rows<F>(&self, mut keep: F) -> RecordBatch
    where
        F: FnMut(&Record) -> bool,
    {
        let rows = self.rows.iter().filter(|r| keep(r)).cloned().collect();
        RecordBatch::new(self.schema_ref(), rows)
    }

    /// Consume the batch, rewriting each row in place.
    pub fn map_rows<F>(mut self, mut f: F) -> RecordBatch
    where
        F: FnMut(&mut Record),
    {
        for row in &mut self.rows {
            f(row);
        }
        self
    }
}

impl<'a> IntoIterator for &'a RecordBatch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
