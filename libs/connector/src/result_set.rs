//! Normalized query output: a column schema plus ordered rows.
//!
//! Every scalar coming off the wire is rendered into exactly one [`Value`]
//! variant so serialization is deterministic:
//!
//! | source type                        | value          |
//! |------------------------------------|----------------|
//! | BOOL                               | `Bool`         |
//! | INT2 / INT4 / INT8                 | `Int` (i64)    |
//! | FLOAT4 / FLOAT8                    | `Float` (f64)  |
//! | TEXT / VARCHAR / BPCHAR / NAME     | `Text`         |
//! | TIMESTAMP(TZ) / DATE / TIME        | `Text` (ISO-8601) |
//! | UUID                               | `Text`         |
//! | JSON / JSONB                       | `Text` (compact JSON) |
//! | SQL NULL (any type)                | `Null`         |
//!
//! Integers serialize as JSON numbers without a fractional part, floats
//! with serde_json's shortest round-trip representation, and nulls as JSON
//! `null`, never as an empty string.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Canonical scalar representation of one column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<Option<Value>> for Value {
    fn from(v: Option<Value>) -> Self {
        v.unwrap_or(Value::Null)
    }
}

/// The normalized output of one query: column schema plus ordered rows.
///
/// May hold zero rows but always has a defined (possibly empty) column
/// list, so DDL/DML statements still produce a well-formed result.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Arc<[String]>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Create an empty result set with the given column schema.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: columns.into(),
            rows: Vec::new(),
        }
    }

    /// Append one row. The caller guarantees `values` matches the schema
    /// arity; this is checked in debug builds.
    pub fn push_row(&mut self, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.rows.push(values);
    }

    /// Column names in result order, independent of row iteration.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A finite, restartable iterator over the rows. Each call starts a
    /// fresh pass from the first row.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ResultSet", 2)?;
        state.serialize_field("columns", &*self.columns)?;
        let rows: Vec<Row<'_>> = self.rows().collect();
        state.serialize_field("rows", &rows)?;
        state.end()
    }
}

/// A borrowed view of one row: an ordered mapping from column name to
/// value. Serializes as a JSON object in column order.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Look up a value by column name.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Values in column order.
    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        let mut rs = ResultSet::new(vec!["id".to_string(), "name".to_string()]);
        rs.push_row(vec![Value::Int(1), Value::Text("a".to_string())]);
        rs.push_row(vec![Value::Int(2), Value::Text("b".to_string())]);
        rs
    }

    #[test]
    fn test_schema_independent_of_rows() {
        let rs = ResultSet::new(vec!["count".to_string()]);
        assert_eq!(rs.columns(), &["count".to_string()]);
        assert!(rs.is_empty());
    }

    #[test]
    fn test_ddl_result_has_empty_column_list() {
        let rs = ResultSet::new(Vec::new());
        assert!(rs.columns().is_empty());
        assert_eq!(rs.row_count(), 0);
    }

    #[test]
    fn test_rows_iterator_is_restartable() {
        let rs = sample();
        assert_eq!(rs.rows().count(), 2);
        // A second pass starts from the first row again.
        let first = rs.rows().next().unwrap();
        assert_eq!(first.get("id"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_row_lookup_and_order() {
        let rs = sample();
        let row = rs.rows().nth(1).unwrap();
        assert_eq!(row.get("name"), Some(&Value::Text("b".to_string())));
        assert_eq!(row.get("missing"), None);
        let cols: Vec<&str> = row.iter().map(|(c, _)| c).collect();
        assert_eq!(cols, vec!["id", "name"]);
    }

    #[test]
    fn test_serialization_round_trip_preserves_order_and_values() {
        let rs = sample();
        let json = serde_json::to_value(&rs).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "columns": ["id", "name"],
                "rows": [
                    {"id": 1, "name": "a"},
                    {"id": 2, "name": "b"},
                ],
            })
        );
        // Key order inside each row object follows the column order.
        let rendered = serde_json::to_string(&rs).unwrap();
        assert!(rendered.find("\"id\"").unwrap() < rendered.find("\"name\"").unwrap());
    }

    #[test]
    fn test_scalar_serialization_shapes() {
        let mut rs = ResultSet::new(vec![
            "n".to_string(),
            "f".to_string(),
            "b".to_string(),
            "missing".to_string(),
        ]);
        rs.push_row(vec![
            Value::Int(42),
            Value::Float(1.5),
            Value::Bool(true),
            Value::Null,
        ]);
        let json = serde_json::to_value(&rs).unwrap();
        assert_eq!(
            json["rows"][0],
            serde_json::json!({"n": 42, "f": 1.5, "b": true, "missing": null})
        );
    }

    #[test]
    fn test_null_is_not_empty_string() {
        let rendered = serde_json::to_string(&Value::Null).unwrap();
        assert_eq!(rendered, "null");
    }

    #[test]
    fn test_float_full_precision() {
        let rendered = serde_json::to_string(&Value::Float(0.1 + 0.2)).unwrap();
        let back: f64 = rendered.parse().unwrap();
        assert_eq!(back, 0.1 + 0.2);
    }
}
