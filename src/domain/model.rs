use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column name -> position in a record's values. Rows read from one table
/// share a single index.
pub type ColumnIndex = HashMap<String, usize>;

/// One catalog item; cell values are JSON scalars (`Null` for a missing cell).
#[derive(Debug, Clone, Default)]
pub struct Record {
    columns: Arc<ColumnIndex>,
    values: Vec<Value>,
}

impl Record {
    /// A row whose values line up with `columns`; missing trailing cells
    /// are null.
    pub fn from_values(columns: Arc<ColumnIndex>, mut values: Vec<Value>) -> Self {
        if values.len() < columns.len() {
            values.resize(columns.len(), Value::Null);
        }
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column).and_then(|&i| self.values.get(i))
    }

    /// Sets a cell. A new column copies the shared index first.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.columns.get(&column).and_then(|&i| self.values.get_mut(i)) {
            *slot = value;
            return;
        }
        let i = self.values.len();
        Arc::make_mut(&mut self.columns).insert(column, i);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .filter_map(|(column, &i)| Some((column.as_str(), self.values.get(i)?)))
    }

    /// True when the column exists and is not null or an empty string.
    pub fn has_value(&self, column: &str) -> bool {
        match self.get(column) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(column, value)| other.get(column) == Some(value))
    }
}

/// What a pipeline's load phase reports back to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub output: String,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }
}

/// Response subset kept in the item cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedItem {
    pub resource_url: String,
}
