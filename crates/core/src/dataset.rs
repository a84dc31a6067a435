//! Preprocessing: normalize raw records into a typed, column-oriented table.
//!
//! Numeric columns never contain NaN or infinities after [`Dataset::preprocess`]:
//! missing values take the column median, infinite values become zero.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::stats;
use crate::value::{DetectionInput, FieldValue, Record};

/// A single column of the preprocessed table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Column {
    Numeric(Vec<f64>),
    Text(Vec<Option<String>>),
}

/// Column-oriented table produced by preprocessing. Column order follows
/// first appearance in the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    columns: IndexMap<String, Column>,
    row_count: usize,
}

impl Dataset {
    /// Normalize a record or a batch into a dataset.
    ///
    /// Deterministic for identical input and free of side effects.
    pub fn preprocess(input: DetectionInput) -> Result<Self> {
        let rows = input.into_rows();
        let row_count = rows.len();

        let mut names: IndexSet<&str> = IndexSet::new();
        for row in &rows {
            for name in row.keys() {
                names.insert(name.as_str());
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let raw: Vec<&FieldValue> = rows
                    .iter()
                    .map(|r| r.get(name).unwrap_or(&FieldValue::Null))
                    .collect();
                (name.to_string(), build_column(&raw))
            })
            .collect();

        Ok(Self { columns, row_count })
    }

    /// Build a dataset from already-typed columns, truncated to the shortest one.
    pub fn from_columns(columns: IndexMap<String, Column>) -> Self {
        let row_count = columns.values().map(column_len).min().unwrap_or(0);
        let columns = columns
            .into_iter()
            .map(|(name, col)| {
                let col = match col {
                    Column::Numeric(mut v) => {
                        v.truncate(row_count);
                        Column::Numeric(v)
                    }
                    Column::Text(mut v) => {
                        v.truncate(row_count);
                        Column::Text(v)
                    }
                };
                (name, col)
            })
            .collect();
        Self { columns, row_count }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Values of a numeric column, or None if absent or textual.
    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(name)? {
            Column::Numeric(v) => Some(v.as_slice()),
            Column::Text(_) => None,
        }
    }

    /// All numeric columns in column order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().filter_map(|(name, col)| match col {
            Column::Numeric(v) => Some((name.as_str(), v.as_slice())),
            Column::Text(_) => None,
        })
    }

    pub fn numeric_column_names(&self) -> Vec<&str> {
        self.numeric_columns().map(|(name, _)| name).collect()
    }

    /// Numeric cell value.
    pub fn value(&self, name: &str, row: usize) -> Option<f64> {
        self.numeric(name).and_then(|v| v.get(row).copied())
    }

    /// Cell rendered as an identifier: text as-is, whole numbers without a
    /// trailing `.0`. Missing text cells yield None.
    pub fn identifier(&self, name: &str, row: usize) -> Option<String> {
        match self.columns.get(name)? {
            Column::Text(v) => v.get(row).cloned().flatten(),
            Column::Numeric(v) => v.get(row).map(|x| {
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    format!("{}", *x as i64)
                } else {
                    x.to_string()
                }
            }),
        }
    }

    /// Row-major matrix of all numeric columns, with the column names.
    pub fn numeric_matrix(&self) -> (Vec<String>, Vec<Vec<f64>>) {
        let cols: Vec<(&str, &[f64])> = self.numeric_columns().collect();
        let names = cols.iter().map(|(n, _)| n.to_string()).collect();
        let rows = (0..self.row_count)
            .map(|r| cols.iter().map(|(_, v)| v[r]).collect())
            .collect();
        (names, rows)
    }

    /// Numeric cells of one row as a JSON object, in column order.
    pub fn numeric_row_snapshot(&self, row: usize) -> Value {
        let map: Map<String, Value> = self
            .numeric_columns()
            .filter_map(|(name, v)| v.get(row).map(|x| (name.to_string(), Value::from(*x))))
            .collect();
        Value::Object(map)
    }
}

fn column_len(col: &Column) -> usize {
    match col {
        Column::Numeric(v) => v.len(),
        Column::Text(v) => v.len(),
    }
}

/// A column is numeric when it has at least one present value and every
/// present value is a number or parses as one.
fn build_column(raw: &[&FieldValue]) -> Column {
    let present: Vec<&FieldValue> = raw.iter().copied().filter(|v| !v.is_missing()).collect();
    let is_numeric = !present.is_empty()
        && present
            .iter()
            .all(|v| !matches!(v, FieldValue::Boolean(_)) && v.as_f64().is_some());

    if !is_numeric {
        return Column::Text(raw.iter().map(|v| v.as_text()).collect());
    }

    let parsed: Vec<Option<f64>> = raw
        .iter()
        .map(|v| if v.is_missing() { None } else { v.as_f64().filter(|x| !x.is_nan()) })
        .collect();

    let finite: Vec<f64> = parsed.iter().flatten().copied().filter(|x| x.is_finite()).collect();
    let fill = stats::median(&finite).unwrap_or(0.0);

    Column::Numeric(
        parsed
            .into_iter()
            .map(|v| match v {
                None => fill,
                Some(x) if x.is_infinite() => 0.0,
                Some(x) => x,
            })
            .collect(),
    )
}

/// Convenience for tests and callers that build records inline.
pub fn record<I, K, V>(fields: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FieldValue>,
{
    fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(v: Value) -> Dataset {
        Dataset::preprocess(DetectionInput::from_json(v).unwrap()).unwrap()
    }

    #[test]
    fn single_record_is_one_row() {
        let ds = table(json!({"supplier_id": "S1", "bid_frequency": 25, "win_rate": 0.85}));
        assert_eq!(ds.row_count(), 1);
        assert_eq!(ds.value("bid_frequency", 0), Some(25.0));
        assert_eq!(ds.identifier("supplier_id", 0).as_deref(), Some("S1"));
        assert!(ds.numeric("supplier_id").is_none());
    }

    #[test]
    fn missing_numeric_values_take_the_median() {
        let ds = table(json!([{"x": 1}, {"x": null}, {"x": 3}, {"x": 10}, {}]));
        assert_eq!(ds.numeric("x").unwrap(), &[1.0, 3.0, 3.0, 10.0, 3.0]);
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let ds = table(json!([{"amount": "100.5"}, {"amount": 200}]));
        assert_eq!(ds.numeric("amount").unwrap(), &[100.5, 200.0]);
    }

    #[test]
    fn mixed_text_column_stays_text() {
        let ds = table(json!([{"code": "A1"}, {"code": 7}]));
        assert!(matches!(ds.column("code"), Some(Column::Text(_))));
        assert_eq!(ds.identifier("code", 1).as_deref(), Some("7"));
    }

    #[test]
    fn nan_text_counts_as_missing() {
        let ds = table(json!([{"x": "NaN"}, {"x": 2}, {"x": 4}]));
        let x = ds.numeric("x").unwrap();
        assert_eq!(x, &[3.0, 2.0, 4.0]);
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn infinite_values_become_zero() {
        let ds = table(json!([{"x": "inf"}, {"x": 2}, {"x": "-inf"}, {"x": 4}]));
        assert_eq!(ds.numeric("x").unwrap(), &[0.0, 2.0, 0.0, 4.0]);
    }

    #[test]
    fn column_order_follows_first_appearance() {
        let ds = table(json!([{"b": 1, "a": 2}, {"c": 3, "a": 4}]));
        let names: Vec<&str> = ds.column_names().collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let input = json!([{"x": 1, "y": "t"}, {"x": null, "y": "u"}]);
        assert_eq!(table(input.clone()), table(input));
    }

    #[test]
    fn numeric_identifiers_render_without_fraction() {
        let ds = table(json!([{"supplier_id": 1001}, {"supplier_id": 1002}]));
        assert_eq!(ds.identifier("supplier_id", 0).as_deref(), Some("1001"));
    }
}
