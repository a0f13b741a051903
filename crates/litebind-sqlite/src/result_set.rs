//! Lazy row sequences.

use crate::statement::{Params, Statement, StepResult};
use litebind_core::{ColumnInfo, Error, MisuseKind, Result, ResultRow, Row, Translator, Value};
use std::fmt;
use std::sync::Arc;

enum StatementSlot<'s, 'c> {
    Borrowed(&'s mut Statement<'c>),
    Owned(Box<Statement<'c>>),
}

impl<'c> StatementSlot<'_, 'c> {
    fn get(&self) -> &Statement<'c> {
        match self {
            StatementSlot::Borrowed(s) => s,
            StatementSlot::Owned(s) => s,
        }
    }

    fn get_mut(&mut self) -> &mut Statement<'c> {
        match self {
            StatementSlot::Borrowed(s) => s,
            StatementSlot::Owned(s) => s,
        }
    }
}

/// Rows of an executed statement, fetched one step at a time.
///
/// Iterating yields `Result<ResultRow>`; the first error ends the sequence.
/// Whether rows are positional or keyed by column name, and whether values
/// pass through the declared-type translator, is fixed when the result set
/// is created from the connection's settings at that moment.
pub struct ResultSet<'s, 'c> {
    stmt: StatementSlot<'s, 'c>,
    translator: Option<Arc<Translator>>,
    as_hash: bool,
    eof: bool,
    closed: bool,
}

impl<'s, 'c> ResultSet<'s, 'c> {
    pub(crate) fn borrowed(stmt: &'s mut Statement<'c>) -> Self {
        Self::new(StatementSlot::Borrowed(stmt))
    }

    pub(crate) fn owned(stmt: Box<Statement<'c>>) -> Self {
        Self::new(StatementSlot::Owned(stmt))
    }

    fn new(stmt: StatementSlot<'s, 'c>) -> Self {
        let conn = stmt.get().connection();
        Self {
            translator: conn.active_translator(),
            as_hash: conn.results_as_hash(),
            stmt,
            eof: false,
            closed: false,
        }
    }

    /// Fetch the next row, or `None` once the statement is done.
    pub fn next_row(&mut self) -> Result<Option<ResultRow>> {
        if self.closed {
            return Err(Error::misuse(
                MisuseKind::ResultSetClosed,
                "cannot read from a closed result set",
            ));
        }
        if self.eof {
            return Ok(None);
        }

        let stmt = self.stmt.get_mut();
        match stmt.step() {
            Ok(StepResult::Row) => {}
            Ok(StepResult::Done) => {
                self.eof = true;
                return Ok(None);
            }
            Err(e) => {
                self.eof = true;
                return Err(e);
            }
        }

        let mut values = stmt.read_values()?;
        if let Some(translator) = &self.translator {
            let types = stmt.declared_types()?;
            values = values
                .into_iter()
                .enumerate()
                .map(|(i, v)| translator.translate(types.get(i).and_then(Option::as_deref), v))
                .collect();
        }

        Ok(Some(if self.as_hash {
            ResultRow::Named(Row::with_columns(stmt.columns()?, values))
        } else {
            ResultRow::Positional(values)
        }))
    }

    /// Drain the remaining rows.
    pub fn collect_rows(mut self) -> Result<Vec<ResultRow>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Column names of the underlying statement.
    pub fn columns(&self) -> Result<Arc<ColumnInfo>> {
        self.check_open()?;
        self.stmt.get().columns()
    }

    /// Declared column types of the underlying statement.
    pub fn types(&self) -> Result<Arc<[Option<String>]>> {
        self.check_open()?;
        self.stmt.get().declared_types()
    }

    /// Returns `true` once every row has been read (or a step failed).
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Rewind and execute again, binding `params` first.
    pub fn reset(&mut self, params: impl Into<Params>) -> Result<()> {
        self.check_open()?;
        self.stmt.get_mut().start_execution(&params.into())?;
        self.eof = false;
        Ok(())
    }

    /// Release the cursor.
    ///
    /// A result set obtained from [`Statement::execute`] resets its statement
    /// so it can run again; one obtained from a connection closes the
    /// statement it owns. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.eof = true;
        match &mut self.stmt {
            StatementSlot::Borrowed(stmt) if stmt.is_closed() => Ok(()),
            StatementSlot::Borrowed(stmt) => stmt.reset(),
            StatementSlot::Owned(stmt) => stmt.close(),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::misuse(
                MisuseKind::ResultSetClosed,
                "result set is closed",
            ))
        } else {
            Ok(())
        }
    }
}

impl Iterator for ResultSet<'_, '_> {
    type Item = Result<ResultRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        self.next_row().transpose()
    }
}

impl Drop for ResultSet<'_, '_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "Error closing result set on drop");
        }
    }
}

impl fmt::Debug for ResultSet<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("sql", &self.stmt.get().sql())
            .field("as_hash", &self.as_hash)
            .field("translating", &self.translator.is_some())
            .field("eof", &self.eof)
            .field("closed", &self.closed)
            .finish()
    }
}

/// First column of every row, for single-column queries.
pub fn first_column(rows: Vec<ResultRow>) -> Vec<Value> {
    rows.into_iter()
        .filter_map(|row| row.into_values().into_iter().next())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use chrono::NaiveDate;

    fn fixture() -> Connection {
        let conn = Connection::open_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, added DATE, flag BOOLEAN);
             INSERT INTO items VALUES (1, 'one', '2024-01-02', 1);
             INSERT INTO items VALUES (2, 'two', '2024-03-04', 0);",
            (),
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_rows_are_lazy_and_fused() {
        let conn = fixture();
        let mut stmt = conn.prepare("SELECT name FROM items ORDER BY id").unwrap();
        let mut rs = stmt.execute(()).unwrap();
        assert!(!rs.is_eof());
        assert_eq!(rs.next_row().unwrap().unwrap()[0], Value::from("one"));
        assert_eq!(rs.next_row().unwrap().unwrap()[0], Value::from("two"));
        assert!(rs.next_row().unwrap().is_none());
        assert!(rs.is_eof());
        assert!(rs.next_row().unwrap().is_none());
    }

    #[test]
    fn test_iterator() {
        let conn = fixture();
        let mut stmt = conn.prepare("SELECT id FROM items ORDER BY id").unwrap();
        let rows: Vec<ResultRow> = stmt.execute(()).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(first_column(rows), vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn test_closed_result_set() {
        let conn = fixture();
        let mut rs = conn.query("SELECT * FROM items", ()).unwrap();
        rs.close().unwrap();
        rs.close().unwrap();
        assert!(rs.is_closed());
        assert!(matches!(
            rs.next_row(),
            Err(Error::Misuse(ref m)) if m.kind == MisuseKind::ResultSetClosed
        ));
        assert!(rs.next().is_none());
        assert!(rs.columns().is_err());
    }

    #[test]
    fn test_reset_runs_again_with_new_params() {
        let conn = fixture();
        let mut stmt = conn.prepare("SELECT name FROM items WHERE id = ?").unwrap();
        let mut rs = stmt.execute(vec![Value::from(1)]).unwrap();
        assert_eq!(rs.next_row().unwrap().unwrap()[0], Value::from("one"));
        rs.reset(vec![Value::from(2)]).unwrap();
        assert_eq!(rs.next_row().unwrap().unwrap()[0], Value::from("two"));
    }

    #[test]
    fn test_statement_survives_borrowed_close() {
        let conn = fixture();
        let mut stmt = conn.prepare("SELECT count(*) FROM items").unwrap();
        {
            let mut rs = stmt.execute(()).unwrap();
            rs.next_row().unwrap();
        }
        assert!(!stmt.is_closed());
        let rows = stmt.execute(()).unwrap().collect_rows().unwrap();
        assert_eq!(rows[0][0], Value::Integer(2));
    }

    #[test]
    fn test_columns_and_types() {
        let conn = fixture();
        let rs = conn.query("SELECT id, name, 1 AS one FROM items", ()).unwrap();
        assert_eq!(rs.columns().unwrap().names(), ["id", "name", "one"]);
        let types = rs.types().unwrap();
        assert_eq!(types[0].as_deref(), Some("INTEGER"));
        assert_eq!(types[1].as_deref(), Some("TEXT"));
        assert_eq!(types[2], None);
    }

    #[test]
    fn test_named_rows() {
        let conn = fixture();
        conn.set_results_as_hash(true);
        let row = conn
            .get_first_row("SELECT id, name FROM items ORDER BY id", ())
            .unwrap()
            .unwrap();
        assert!(row.is_named());
        assert_eq!(row.get_by_name("name"), Some(&Value::from("one")));
        assert_eq!(row[0], Value::Integer(1));
        assert_eq!(row.to_string(), "{id: 1, name: one}");
    }

    #[test]
    fn test_type_translation_by_declared_type() {
        let conn = fixture();
        let raw = conn
            .get_first_row("SELECT added, flag FROM items WHERE id = 1", ())
            .unwrap()
            .unwrap();
        assert_eq!(raw[0], Value::from("2024-01-02"));
        assert_eq!(raw[1], Value::Integer(1));

        conn.set_type_translation(true);
        let row = conn
            .get_first_row("SELECT added, flag, name FROM items WHERE id = 1", ())
            .unwrap()
            .unwrap();
        assert_eq!(
            row[0],
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
        assert_eq!(row[1], Value::Bool(true));
        assert_eq!(row[2], Value::from("one"));
    }

    #[test]
    fn test_custom_converter() {
        let conn = fixture();
        conn.set_type_translation(true);
        conn.translator_mut(|t| {
            t.add("text", |_, v| {
                v.as_str().map(|s| Value::from(s.to_uppercase()))
            })
            .unwrap();
        });
        let names: Vec<Value> = first_column(
            conn.execute("SELECT name FROM items ORDER BY id", ()).unwrap(),
        );
        assert_eq!(names, vec![Value::from("ONE"), Value::from("TWO")]);
    }

    #[test]
    fn test_step_error_ends_iteration() {
        let conn = Connection::open_memory().unwrap();
        let mut rs = conn
            .query(
                "WITH v(x) AS (VALUES (1), (-9223372036854775807 - 1)) SELECT abs(x) FROM v",
                (),
            )
            .unwrap();
        assert!(rs.next().unwrap().is_ok());
        let err = rs.next().unwrap().unwrap_err();
        assert!(err.message().contains("integer overflow"));
        assert!(rs.next().is_none());
    }
}
