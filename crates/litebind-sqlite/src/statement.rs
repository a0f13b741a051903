//! Prepared statements.
//!
//! A [`Statement`] moves through a small state machine:
//!
//! ```text
//! Prepared --bind--> Bound --step--> Row --step--> ... --> Done
//!     \________________________/         \--error--> Failed
//!                  ^                                   |
//!                  +-------------- reset --------------+
//! ```
//!
//! Binding or executing a statement that has already been stepped resets it
//! first. Closing is terminal, and closing the owning connection closes
//! every statement prepared from it.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::connection::Connection;
use crate::ffi;
use crate::result_set::ResultSet;
use crate::types;
use litebind_core::{BindError, ColumnInfo, Error, MisuseKind, Result, Value};
use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::ffi::{CString, c_char, c_int, c_void};
use std::fmt;
use std::ptr;
use std::sync::Arc;

/// Lifecycle state of a [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// Compiled, nothing bound or stepped yet.
    Prepared,
    /// At least one parameter bound, not yet stepped.
    Bound,
    /// The last step produced a row.
    Row,
    /// The last step ran the statement to completion.
    Done,
    /// The last step failed; reset before stepping again.
    Failed,
    /// Finalized. Every further call is a misuse.
    Closed,
}

/// Outcome of a single [`Statement::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Row,
    Done,
}

/// Identifies a bind parameter, either by 1-based position or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Index(usize),
    Name(String),
}

impl From<usize> for ParamKey {
    fn from(index: usize) -> Self {
        ParamKey::Index(index)
    }
}

impl From<i32> for ParamKey {
    fn from(index: i32) -> Self {
        ParamKey::Index(usize::try_from(index).unwrap_or(0))
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        ParamKey::Name(name.to_string())
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        ParamKey::Name(name)
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Index(i) => write!(f, "{i}"),
            ParamKey::Name(n) => f.write_str(n),
        }
    }
}

/// A set of parameters to bind before execution.
///
/// Names may be given with or without their sigil: `"id"` matches `:id`,
/// `@id` or `$id` in the SQL, tried in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    /// Bind nothing; earlier bindings stay in place.
    #[default]
    None,
    /// Bound to positions 1, 2, ...
    Positional(Vec<Value>),
    /// Bound by name.
    Named(Vec<(String, Value)>),
}

impl Params {
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Positional(v) => v.is_empty(),
            Params::Named(v) => v.is_empty(),
        }
    }
}

impl From<()> for Params {
    fn from((): ()) -> Self {
        Params::None
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<&[Value]> for Params {
    fn from(values: &[Value]) -> Self {
        Params::Positional(values.to_vec())
    }
}

impl<const N: usize> From<[Value; N]> for Params {
    fn from(values: [Value; N]) -> Self {
        Params::Positional(values.into())
    }
}

impl From<Vec<(String, Value)>> for Params {
    fn from(pairs: Vec<(String, Value)>) -> Self {
        Params::Named(pairs)
    }
}

impl From<Vec<(&str, Value)>> for Params {
    fn from(pairs: Vec<(&str, Value)>) -> Self {
        Params::Named(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

impl<S: std::hash::BuildHasher> From<HashMap<String, Value, S>> for Params {
    fn from(map: HashMap<String, Value, S>) -> Self {
        Params::Named(map.into_iter().collect())
    }
}

impl<S: std::hash::BuildHasher> From<HashMap<&str, Value, S>> for Params {
    fn from(map: HashMap<&str, Value, S>) -> Self {
        Params::Named(map.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

impl From<BTreeMap<String, Value>> for Params {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Params::Named(map.into_iter().collect())
    }
}

/// A compiled SQL statement bound to its connection.
pub struct Statement<'conn> {
    conn: &'conn Connection,
    handle: *mut ffi::sqlite3_stmt,
    sql: String,
    remainder: String,
    state: StatementState,
    bound: bool,
    columns: OnceCell<Arc<ColumnInfo>>,
    declared_types: OnceCell<Arc<[Option<String>]>>,
}

impl<'conn> Statement<'conn> {
    /// Compile the first statement in `sql`.
    ///
    /// Text after that statement is kept, trimmed, as the
    /// [`remainder`](Self::remainder). SQL that holds no statement (empty,
    /// whitespace, a comment) yields a statement that is immediately done.
    pub(crate) fn prepare(conn: &'conn Connection, sql: &str) -> Result<Self> {
        let db = conn.handle()?;
        let mut handle: *mut ffi::sqlite3_stmt = ptr::null_mut();

        let (rc, remainder) = if conn.encoding().is_utf16() {
            let units: Vec<u16> = sql.encode_utf16().collect();
            let byte_len = c_int::try_from(units.len() * 2)
                .map_err(|_| Error::config("SQL text is too long"))?;
            let mut tail: *const c_void = ptr::null();
            // SAFETY: units outlives the call; byte_len is its exact size
            let rc = unsafe {
                ffi::sqlite3_prepare16_v2(
                    db,
                    units.as_ptr().cast(),
                    byte_len,
                    &mut handle,
                    &mut tail,
                )
            };
            let consumed = if tail.is_null() {
                units.len()
            } else {
                ((tail as usize).saturating_sub(units.as_ptr() as usize)) / 2
            };
            let rest = units.get(consumed..).unwrap_or_default();
            (rc, String::from_utf16_lossy(rest))
        } else {
            let byte_len =
                c_int::try_from(sql.len()).map_err(|_| Error::config("SQL text is too long"))?;
            let mut tail: *const c_char = ptr::null();
            // SAFETY: sql outlives the call; byte_len is its exact size
            let rc = unsafe {
                ffi::sqlite3_prepare_v2(
                    db,
                    sql.as_ptr().cast(),
                    byte_len,
                    &mut handle,
                    &mut tail,
                )
            };
            let consumed = if tail.is_null() {
                sql.len()
            } else {
                (tail as usize).saturating_sub(sql.as_ptr() as usize)
            };
            (rc, sql.get(consumed..).unwrap_or_default().to_string())
        };

        if rc != ffi::SQLITE_OK {
            let err = conn.last_error(rc, Some(sql));
            if !handle.is_null() {
                // SAFETY: handle came from the failed prepare and is unused
                unsafe { ffi::sqlite3_finalize(handle) };
            }
            tracing::debug!(sql = %sql, error = %err, "Prepare failed");
            return Err(Error::Prepare(err));
        }

        let stmt = Self {
            conn,
            handle,
            sql: sql
                .get(..sql.len().saturating_sub(remainder.len()))
                .unwrap_or(sql)
                .trim()
                .to_string(),
            remainder: remainder.trim().to_string(),
            state: StatementState::Prepared,
            bound: false,
            columns: OnceCell::new(),
            declared_types: OnceCell::new(),
        };
        tracing::trace!(sql = %stmt.sql, "Prepared statement");
        Ok(stmt)
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// The SQL of this statement, without any text that followed it.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Trimmed text following the first statement, possibly empty.
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    pub fn state(&self) -> StatementState {
        if self.state != StatementState::Closed && self.conn.is_closed() {
            StatementState::Closed
        } else {
            self.state
        }
    }

    /// Returns `true` once the statement, or its connection, is closed.
    pub fn is_closed(&self) -> bool {
        self.state() == StatementState::Closed
    }

    /// Bind one parameter.
    ///
    /// A statement that has been stepped is reset first. Other parameters
    /// keep their values.
    pub fn bind_param(&mut self, key: impl Into<ParamKey>, value: impl Into<Value>) -> Result<()> {
        self.check_open()?;
        self.reset_if_stepped()?;
        self.bind_one(&key.into(), &value.into())
    }

    /// Bind a set of parameters, resetting first if the statement was stepped.
    pub fn bind_params(&mut self, params: impl Into<Params>) -> Result<()> {
        self.check_open()?;
        self.reset_if_stepped()?;
        self.bind_all(&params.into())
    }

    /// Bind `params` and return a result set positioned before the first row.
    ///
    /// Nothing is stepped until the result set is advanced.
    pub fn execute(&mut self, params: impl Into<Params>) -> Result<ResultSet<'_, 'conn>> {
        self.start_execution(&params.into())?;
        Ok(ResultSet::borrowed(self))
    }

    /// Bind `params`, run the statement to completion and return the
    /// number of rows it changed.
    pub fn run(&mut self, params: impl Into<Params>) -> Result<u64> {
        self.run_to_completion(&params.into(), false)?;
        self.conn.changes()
    }

    /// Advance one step.
    ///
    /// Once done, further steps keep returning [`StepResult::Done`] until the
    /// statement is reset. After a failed step, stepping again without a
    /// reset is a misuse.
    pub fn step(&mut self) -> Result<StepResult> {
        let handle = self.check_open()?;
        match self.state {
            StatementState::Done => return Ok(StepResult::Done),
            StatementState::Failed => {
                return Err(Error::misuse(
                    MisuseKind::ResetRequired,
                    "statement failed; reset it before stepping again",
                ));
            }
            _ => {}
        }
        if handle.is_null() {
            self.state = StatementState::Done;
            return Ok(StepResult::Done);
        }

        let first_step = matches!(self.state, StatementState::Prepared | StatementState::Bound);
        // SAFETY: handle is a live statement on an open connection
        let rc = unsafe { ffi::sqlite3_step(handle) };
        if first_step {
            // the engine may have recompiled against a changed schema
            self.forget_columns();
        }
        match rc {
            ffi::SQLITE_ROW => {
                self.state = StatementState::Row;
                Ok(StepResult::Row)
            }
            ffi::SQLITE_DONE => {
                self.state = StatementState::Done;
                Ok(StepResult::Done)
            }
            _ => {
                self.state = StatementState::Failed;
                let err = self.conn.last_error(rc, Some(&self.sql));
                tracing::debug!(sql = %self.sql, error = %err, "Step failed");
                Err(Error::Step(err))
            }
        }
    }

    /// Rewind to before the first row, keeping bindings.
    pub fn reset(&mut self) -> Result<()> {
        let handle = self.check_open()?;
        if !handle.is_null() {
            // SAFETY: handle is a live statement on an open connection
            let rc = unsafe { ffi::sqlite3_reset(handle) };
            if rc != ffi::SQLITE_OK {
                // sqlite3_reset repeats the error of the last failed step
                tracing::trace!(rc, sql = %self.sql, "Reset after failed step");
            }
        }
        self.state = if self.bound {
            StatementState::Bound
        } else {
            StatementState::Prepared
        };
        self.forget_columns();
        Ok(())
    }

    /// Set every parameter back to NULL.
    pub fn clear_bindings(&mut self) -> Result<()> {
        let handle = self.check_open()?;
        if !handle.is_null() {
            // SAFETY: handle is a live statement on an open connection
            unsafe { ffi::sqlite3_clear_bindings(handle) };
        }
        self.bound = false;
        if self.state == StatementState::Bound {
            self.state = StatementState::Prepared;
        }
        Ok(())
    }

    /// Number of bind parameters; the largest index for numbered ones.
    pub fn parameter_count(&self) -> Result<usize> {
        let handle = self.check_open()?;
        if handle.is_null() {
            return Ok(0);
        }
        // SAFETY: handle is a live statement on an open connection
        Ok(unsafe { ffi::sqlite3_bind_parameter_count(handle) } as usize)
    }

    pub fn column_count(&self) -> Result<usize> {
        let handle = self.check_open()?;
        Ok(raw_column_count(handle) as usize)
    }

    /// Result column names, in order.
    pub fn columns(&self) -> Result<Arc<ColumnInfo>> {
        let handle = self.check_open()?;
        let info = self.columns.get_or_init(|| {
            let names = (0..raw_column_count(handle))
                // SAFETY: i is below the column count of a live statement
                .map(|i| unsafe { types::column_name(handle, i) }.unwrap_or_default())
                .collect();
            Arc::new(ColumnInfo::new(names))
        });
        Ok(Arc::clone(info))
    }

    /// Declared SQL type of each result column.
    ///
    /// `None` for columns that are expressions rather than table columns.
    pub fn declared_types(&self) -> Result<Arc<[Option<String>]>> {
        let handle = self.check_open()?;
        let types = self.declared_types.get_or_init(|| {
            (0..raw_column_count(handle))
                // SAFETY: i is below the column count of a live statement
                .map(|i| unsafe { types::column_decltype(handle, i) })
                .collect()
        });
        Ok(Arc::clone(types))
    }

    /// Finalize the statement. Closing twice is a no-op.
    ///
    /// If the connection was closed first, the statement was finalized with
    /// it and there is nothing left to release.
    pub fn close(&mut self) -> Result<()> {
        if self.state == StatementState::Closed {
            return Ok(());
        }
        let last_step_failed = self.state == StatementState::Failed;
        self.state = StatementState::Closed;
        let handle = std::mem::replace(&mut self.handle, ptr::null_mut());
        if handle.is_null() || self.conn.is_closed() {
            return Ok(());
        }

        // SAFETY: handle is live and is never used again
        let rc = unsafe { ffi::sqlite3_finalize(handle) };
        // finalize repeats the last step's error; that one was already reported
        if rc != ffi::SQLITE_OK && !last_step_failed {
            return Err(Error::Close(self.conn.last_error(rc, Some(&self.sql))));
        }
        tracing::trace!(sql = %self.sql, "Finalized statement");
        Ok(())
    }

    /// Reset if stepped, then bind. Shared by every execute path.
    pub(crate) fn start_execution(&mut self, params: &Params) -> Result<()> {
        self.check_open()?;
        self.reset_if_stepped()?;
        self.bind_all(params)
    }

    /// Execute and step until done, returning the number of rows seen.
    ///
    /// With `forbid_rows`, the first row is an error instead.
    pub(crate) fn run_to_completion(&mut self, params: &Params, forbid_rows: bool) -> Result<usize> {
        self.start_execution(params)?;
        let mut rows = 0;
        while self.step()? == StepResult::Row {
            if forbid_rows {
                return Err(Error::misuse(
                    MisuseKind::RowsInBatch,
                    format!("statement in batch returned rows: {}", self.sql),
                ));
            }
            rows += 1;
        }
        Ok(rows)
    }

    /// Values of the current row, in column order.
    pub(crate) fn read_values(&self) -> Result<Vec<Value>> {
        let handle = self.check_open()?;
        let encoding = self.conn.encoding();
        Ok((0..raw_column_count(handle))
            // SAFETY: the statement just returned a row and i is in range
            .map(|i| unsafe { types::read_column(handle, i, encoding) })
            .collect())
    }

    fn forget_columns(&mut self) {
        self.columns.take();
        self.declared_types.take();
    }

    fn check_open(&self) -> Result<*mut ffi::sqlite3_stmt> {
        if self.state == StatementState::Closed {
            return Err(Error::misuse(
                MisuseKind::StatementClosed,
                "cannot use a closed statement",
            ));
        }
        if self.conn.is_closed() {
            return Err(Error::misuse(
                MisuseKind::StatementClosed,
                "statement was finalized when its database closed",
            ));
        }
        Ok(self.handle)
    }

    fn reset_if_stepped(&mut self) -> Result<()> {
        if matches!(
            self.state,
            StatementState::Row | StatementState::Done | StatementState::Failed
        ) {
            self.reset()?;
        }
        Ok(())
    }

    fn bind_all(&mut self, params: &Params) -> Result<()> {
        match params {
            Params::None => Ok(()),
            Params::Positional(values) => values
                .iter()
                .enumerate()
                .try_for_each(|(i, v)| self.bind_one(&ParamKey::Index(i + 1), v)),
            Params::Named(pairs) => pairs
                .iter()
                .try_for_each(|(name, v)| self.bind_one(&ParamKey::Name(name.clone()), v)),
        }
    }

    fn bind_one(&mut self, key: &ParamKey, value: &Value) -> Result<()> {
        let handle = self.check_open()?;
        let index = self.resolve(key)?;
        // SAFETY: handle is live and index was checked against it
        let rc = unsafe { types::bind_value(handle, index, value, self.conn.encoding()) };
        if rc != ffi::SQLITE_OK {
            let err = self.conn.last_error(rc, None);
            return Err(Error::Bind(BindError {
                parameter: key.to_string(),
                message: err.message,
                code: Some(err.code),
            }));
        }
        self.bound = true;
        if self.state == StatementState::Prepared {
            self.state = StatementState::Bound;
        }
        tracing::trace!(parameter = %key, value_type = value.type_name(), "Bound parameter");
        Ok(())
    }

    /// Map a key to the engine's 1-based parameter index.
    fn resolve(&self, key: &ParamKey) -> Result<c_int> {
        let count = self.parameter_count()?;
        match key {
            ParamKey::Index(i) if (1..=count).contains(i) => Ok(*i as c_int),
            ParamKey::Index(i) => Err(Error::Bind(BindError {
                parameter: key.to_string(),
                message: format!("index {i} out of range (statement has {count} parameters)"),
                code: Some(ffi::SQLITE_RANGE),
            })),
            ParamKey::Name(name) => {
                let candidates: Vec<String> = if name.starts_with([':', '@', '$', '?']) {
                    vec![name.clone()]
                } else {
                    [":", "@", "$"].iter().map(|s| format!("{s}{name}")).collect()
                };
                candidates
                    .iter()
                    .find_map(|c| self.parameter_index(c))
                    .ok_or_else(|| {
                        Error::Bind(BindError {
                            parameter: name.clone(),
                            message: "no such bind parameter".to_string(),
                            code: None,
                        })
                    })
            }
        }
    }

    fn parameter_index(&self, name: &str) -> Option<c_int> {
        if self.handle.is_null() {
            return None;
        }
        let c_name = CString::new(name).ok()?;
        // SAFETY: handle is live; c_name is NUL-terminated
        let index = unsafe { ffi::sqlite3_bind_parameter_index(self.handle, c_name.as_ptr()) };
        (index > 0).then_some(index)
    }
}

fn raw_column_count(handle: *mut ffi::sqlite3_stmt) -> c_int {
    if handle.is_null() {
        0
    } else {
        // SAFETY: callers pass a live statement
        unsafe { ffi::sqlite3_column_count(handle) }
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(sql = %self.sql, error = %e, "Error finalizing statement on drop");
        }
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
