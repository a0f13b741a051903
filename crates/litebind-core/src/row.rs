//! Decoded result rows.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::{FromValue, Value};
use std::collections::HashMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
///
/// Fetched once per execution and handed to every row by `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Build column info from names in declaration order.
    ///
    /// When two columns share a name, lookup by name finds the first.
    pub fn new(names: Vec<String>) -> Self {
        let mut name_to_index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            name_to_index.entry(name.clone()).or_insert(i);
        }
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A row with named access to its columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a row with its own column metadata.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            values,
            columns: Arc::new(ColumnInfo::new(column_names)),
        }
    }

    /// Create a row sharing column metadata with its siblings.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Get a typed value by column index.
    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| out_of_bounds::<T>(index, self.len()))?;
        T::from_value(value)
    }

    /// Get a typed value by column name.
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("column '{}' not found", name),
                column: Some(name.to_string()),
            })
        })?;
        T::from_value(value).map_err(|e| match e {
            Error::Type(mut te) => {
                te.column = Some(name.to_string());
                Error::Type(te)
            }
            e => e,
        })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Iterate over (column_name, value) pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.column_names().zip(self.values.iter())
    }
}

/// One decoded row, shaped by the connection's row preference.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRow {
    /// Values in column order.
    Positional(Vec<Value>),
    /// Values keyed by column name, declaration order preserved.
    Named(Row),
}

impl ResultRow {
    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values().get(index)
    }

    /// Lookup by column name; positional rows have no names.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        match self {
            ResultRow::Positional(_) => None,
            ResultRow::Named(row) => row.get_by_name(name),
        }
    }

    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| out_of_bounds::<T>(index, self.len()))?;
        T::from_value(value)
    }

    pub fn is_named(&self) -> bool {
        matches!(self, ResultRow::Named(_))
    }

    pub fn as_named(&self) -> Option<&Row> {
        match self {
            ResultRow::Named(row) => Some(row),
            ResultRow::Positional(_) => None,
        }
    }

    pub fn values(&self) -> &[Value] {
        match self {
            ResultRow::Positional(values) => values,
            ResultRow::Named(row) => row.values(),
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            ResultRow::Positional(values) => values,
            ResultRow::Named(row) => row.into_values(),
        }
    }
}

impl Index<usize> for ResultRow {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values()[index]
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultRow::Positional(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            ResultRow::Named(row) => {
                f.write_str("{")?;
                for (i, (name, v)) in row.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn out_of_bounds<T>(index: usize, len: usize) -> Error {
    Error::Type(TypeError {
        expected: std::any::type_name::<T>(),
        actual: format!("index {} out of bounds (row has {} columns)", index, len),
        column: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Row {
        Row::new(
            vec!["id".to_string(), "name".to_string(), "age".to_string()],
            vec![Value::Integer(1), Value::from("Alice"), Value::Integer(30)],
        )
    }

    #[test]
    fn named_access() {
        let row = person();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(0), Some(&Value::Integer(1)));
        assert_eq!(row.get(3), None);
        assert_eq!(row.get_by_name("name"), Some(&Value::from("Alice")));
        assert_eq!(row.get_by_name("missing"), None);
        assert_eq!(row.get_named::<i32>("age").unwrap(), 30);
        assert_eq!(row.get_as::<String>(1).unwrap(), "Alice");
    }

    #[test]
    fn typed_access_reports_column() {
        let row = person();
        match row.get_named::<i64>("name") {
            Err(Error::Type(te)) => assert_eq!(te.column.as_deref(), Some("name")),
            other => panic!("expected type error, got {other:?}"),
        }
        assert!(row.get_named::<i64>("missing").is_err());
        assert!(row.get_as::<i64>(99).is_err());
    }

    #[test]
    fn declaration_order_is_kept() {
        let row = Row::new(
            vec!["z".to_string(), "a".to_string()],
            vec![Value::Integer(1), Value::Integer(2)],
        );
        let pairs: Vec<_> = row.iter().collect();
        assert_eq!(pairs, vec![("z", &Value::Integer(1)), ("a", &Value::Integer(2))]);
        assert_eq!(ResultRow::Named(row).to_string(), "{z: 1, a: 2}");
    }

    #[test]
    fn duplicate_names_resolve_to_first() {
        let info = ColumnInfo::new(vec!["x".into(), "x".into()]);
        assert_eq!(info.index_of("x"), Some(0));
        assert_eq!(info.len(), 2);
    }

    #[test]
    fn shared_columns() {
        let columns = Arc::new(ColumnInfo::new(vec!["id".to_string()]));
        let a = Row::with_columns(Arc::clone(&columns), vec![Value::Integer(1)]);
        let b = Row::with_columns(Arc::clone(&columns), vec![Value::Integer(2)]);
        assert!(Arc::ptr_eq(&a.column_info(), &b.column_info()));
    }

    #[test]
    fn result_row_shapes() {
        let positional = ResultRow::Positional(vec![Value::Null, Value::from("text1")]);
        assert!(!positional.is_named());
        assert_eq!(positional[1].to_string(), "text1");
        assert_eq!(positional.get_by_name("anything"), None);
        assert_eq!(positional.to_string(), "[NULL, text1]");

        let named = ResultRow::Named(person());
        assert!(named.is_named());
        assert_eq!(named.get_by_name("age"), Some(&Value::Integer(30)));
        assert_eq!(named.get_as::<i64>(0).unwrap(), 1);
        assert_eq!(named.into_values().len(), 3);
    }
}
