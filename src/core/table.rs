use crate::core::query::Query;
use crate::domain::model::{ColumnIndex, Record};
use crate::utils::error::{EtlError, Result};
use crate::utils::json_path::value_to_string;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Rows with a fixed column order, as read from or written to CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let name = name.trim_start_matches('\u{feff}');
                if name.is_empty() {
                    format!("Unnamed: {}", i)
                } else {
                    name.to_string()
                }
            })
            .collect();

        let index: Arc<ColumnIndex> = Arc::new(
            columns
                .iter()
                .enumerate()
                .map(|(i, column)| (column.clone(), i))
                .collect(),
        );
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let values = (0..columns.len())
                .map(|i| parse_cell(row.get(i).unwrap_or("")))
                .collect();
            records.push(Record::from_values(index.clone(), values));
        }

        Ok(Self { columns, records })
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for record in &self.records {
            writer.write_record(self.columns.iter().map(|column| {
                record.get(column).map(value_to_string).unwrap_or_default()
            }))?;
        }
        writer
            .into_inner()
            .map_err(|e| EtlError::processing(format!("Failed to flush CSV: {}", e)))
    }

    /// Keeps the rows matching `query`. Unknown columns are an error.
    pub fn filter(self, query: &Query) -> Result<Self> {
        query.check_columns(&self.columns)?;
        let Self { columns, records } = self;
        let records = records.into_iter().filter(|r| query.matches(r)).collect();
        Ok(Self { columns, records })
    }

    /// Parses and applies a query string; a blank string keeps every row.
    pub fn query(self, source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Ok(self);
        }
        let query = Query::parse(source)?;
        let table = self.filter(&query)?;
        tracing::info!(
            "{} items after filtering with query: {}",
            table.len(),
            query.as_str()
        );
        Ok(table)
    }

    pub fn filter_not_null(self, column: &str) -> Result<Self> {
        self.require_column(column)?;
        let Self { columns, records } = self;
        let records = records.into_iter().filter(|r| r.has_value(column)).collect();
        Ok(Self { columns, records })
    }

    /// Keeps rows whose column is `True` (or the string "True").
    pub fn filter_truthy(self, column: &str) -> Result<Self> {
        self.require_column(column)?;
        let Self { columns, records } = self;
        let records = records
            .into_iter()
            .filter(|r| match r.get(column) {
                Some(Value::Bool(b)) => *b,
                Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
                Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
                _ => false,
            })
            .collect();
        Ok(Self { columns, records })
    }

    /// Non-null values and their counts, most frequent first, ties by value.
    pub fn value_counts(&self, column: &str) -> Result<Vec<(String, usize)>> {
        self.require_column(column)?;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in &self.records {
            if record.has_value(column) {
                let key = record.get(column).map(value_to_string).unwrap_or_default();
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }

    pub fn value_counts_csv(&self, column: &str) -> Result<Vec<u8>> {
        let counts = self.value_counts(column)?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([column, "count"])?;
        for (value, count) in counts {
            writer.write_record([value, count.to_string()])?;
        }
        writer
            .into_inner()
            .map_err(|e| EtlError::processing(format!("Failed to flush CSV: {}", e)))
    }

    fn require_column(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(EtlError::processing(format!(
                "Column '{}' not found in data",
                column
            )))
        }
    }
}

/// Types a raw CSV cell the way the rest of the crate expects: empty cells
/// are null, `True`/`False` are booleans, numbers are numbers. Strings with
/// a leading zero such as `0071` stay strings so identifiers survive.
pub fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "" => return Value::Null,
        "True" | "true" => return Value::Bool(true),
        "False" | "false" => return Value::Bool(false),
        _ => {}
    }

    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    if leading_zero || !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return Value::String(raw.to_string());
    }

    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Replaces each `{column}` in `template` with the record's value.
pub fn format_template(template: &str, record: &Record) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| EtlError::processing(format!("Unclosed '{{' in {}", template)))?;
        let column = &after[..end];
        let value = record.get(column).ok_or_else(|| {
            EtlError::processing(format!("Template {} uses unknown column '{}'", template, column))
        })?;
        out.push_str(&value_to_string(value));
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}
