//! SQLite connection implementation.
//!
//! A [`Connection`] owns one native database handle. Statements prepared
//! from it borrow it; closing the connection finalizes every statement that
//! is still open and leaves their Rust wrappers inert.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::borrow_as_ptr)]

use crate::driver::{Backend, Driver};
use crate::ffi;
use crate::result_set::ResultSet;
use crate::statement::{Params, Statement};
use litebind_core::{
    Encoding, Error, MisuseKind, Result, ResultRow, SqliteError, Translator, Value,
};
use serde::{Deserialize, Serialize};
use std::ffi::{CString, c_int};
use std::fmt;
use std::ops::Deref;
use std::ptr;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Path token for an in-memory database.
pub const MEMORY: &str = ":memory:";

/// Options for opening a connection.
///
/// Deserializes with every field optional, so a config file only needs the
/// settings it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Charset for SQL text and strings: "UTF-8", "UTF-16", "UTF-16LE", ...
    pub encoding: String,
    /// Busy timeout in milliseconds; 0 leaves the engine default (no wait).
    pub busy_timeout_ms: u32,
    /// Yield rows keyed by column name instead of positional rows.
    pub results_as_hash: bool,
    /// Translate values through the declared-type converter table.
    pub type_translation: bool,
    /// Native backend.
    pub backend: Backend,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in multi-thread mode (connections not shared between threads).
    pub no_mutex: bool,
    /// Open in serialized mode (connections can be shared).
    pub full_mutex: bool,
    /// Enable shared cache mode.
    pub shared_cache: bool,
    /// Disable shared cache mode.
    pub private_cache: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    pub(crate) fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.no_mutex {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }
        if self.private_cache {
            flags |= ffi::SQLITE_OPEN_PRIVATECACHE;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            path: MEMORY.to_string(),
            flags: OpenFlags::create_read_write(),
            encoding: Encoding::Utf8.name().to_string(),
            busy_timeout_ms: 0,
            results_as_hash: false,
            type_translation: false,
            backend: Backend::default(),
        }
    }
}

impl OpenOptions {
    /// Options for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Options for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Parse options from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(format!("invalid options: {e}")))
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the connection charset.
    pub fn encoding(mut self, charset: impl Into<String>) -> Self {
        self.encoding = charset.into();
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    pub fn results_as_hash(mut self, enabled: bool) -> Self {
        self.results_as_hash = enabled;
        self
    }

    pub fn type_translation(mut self, enabled: bool) -> Self {
        self.type_translation = enabled;
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }
}

/// How `BEGIN` acquires locks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionMode {
    /// Locks are taken on first read/write.
    #[default]
    Deferred,
    /// A write lock is taken immediately.
    Immediate,
    /// An exclusive lock is taken immediately.
    Exclusive,
}

impl TransactionMode {
    pub const fn as_sql(self) -> &'static str {
        match self {
            TransactionMode::Deferred => "DEFERRED",
            TransactionMode::Immediate => "IMMEDIATE",
            TransactionMode::Exclusive => "EXCLUSIVE",
        }
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for TransactionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deferred" => Ok(TransactionMode::Deferred),
            "immediate" => Ok(TransactionMode::Immediate),
            "exclusive" => Ok(TransactionMode::Exclusive),
            _ => Err(Error::config(format!("unknown transaction mode '{s}'"))),
        }
    }
}

/// Mutable connection state, protected by a mutex.
struct ConnectionState {
    db: *mut ffi::sqlite3,
    closed: bool,
    in_transaction: bool,
    results_as_hash: bool,
    type_translation: bool,
    translator: Option<Arc<Translator>>,
}

/// A connection to a SQLite database.
pub struct Connection {
    state: Mutex<ConnectionState>,
    interrupt: Arc<Mutex<*mut ffi::sqlite3>>,
    encoding: Encoding,
    path: String,
    driver: Driver,
}

// SAFETY: the handle is only reached through the mutex and bundled SQLite is
// built in serialized mode. Connection is deliberately not Sync: statements
// borrow it, and closing it from another thread would finalize them mid-use.
unsafe impl Send for Connection {}

/// Interrupts a connection from another thread.
///
/// Obtained from [`Connection::interrupt_handle`]. Once the connection is
/// closed, [`interrupt`](Self::interrupt) does nothing.
#[derive(Clone)]
pub struct InterruptHandle {
    db: Arc<Mutex<*mut ffi::sqlite3>>,
}

// SAFETY: the pointer is only used for sqlite3_interrupt, under the mutex, and
// is nulled under the same mutex before the connection is released.
unsafe impl Send for InterruptHandle {}
unsafe impl Sync for InterruptHandle {}

impl InterruptHandle {
    pub fn interrupt(&self) {
        let db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        if !db.is_null() {
            tracing::debug!("Interrupt requested");
            // SAFETY: non-null means the connection is still open
            unsafe { ffi::sqlite3_interrupt(*db) };
        }
    }
}

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptHandle").finish_non_exhaustive()
    }
}

impl Connection {
    /// Open a connection, initialising the backend named in `options`.
    pub fn open(options: &OpenOptions) -> Result<Self> {
        let driver = Driver::new(options.backend)?;
        Self::open_with(&driver, options)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&OpenOptions::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&OpenOptions::file(path))
    }

    /// Open a connection through an already initialised driver.
    #[tracing::instrument(level = "debug", skip(driver, options), fields(path = %options.path))]
    pub fn open_with(driver: &Driver, options: &OpenOptions) -> Result<Self> {
        let encoding = Encoding::find_native(&options.encoding)?;
        let c_path = CString::new(options.path.as_str())
            .map_err(|_| Error::config("Invalid path: contains null byte"))?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = options.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let err = if db.is_null() {
                SqliteError::new(rc, ffi::error_string(rc))
            } else {
                // SAFETY: db is a valid (if unusable) handle that we own
                unsafe {
                    let err = SqliteError::new(rc, ffi::errmsg(db))
                        .with_extended_code(ffi::sqlite3_extended_errcode(db));
                    ffi::sqlite3_close_v2(db);
                    err
                }
            };
            tracing::debug!(error = %err, "Open failed");
            return Err(Error::Open(err));
        }

        let conn = Self {
            state: Mutex::new(ConnectionState {
                db,
                closed: false,
                in_transaction: false,
                results_as_hash: options.results_as_hash,
                type_translation: options.type_translation,
                translator: None,
            }),
            interrupt: Arc::new(Mutex::new(db)),
            encoding,
            path: options.path.clone(),
            driver: *driver,
        };

        // From here on, an early return drops `conn`, which closes the handle.
        if encoding.is_utf16() {
            let pragma = match encoding {
                Encoding::Utf16Be => "PRAGMA encoding = 'UTF-16be'",
                _ => "PRAGMA encoding = 'UTF-16le'",
            };
            conn.execute_batch(pragma, ()).map_err(into_open_error)?;
        }

        if options.busy_timeout_ms > 0 {
            conn.busy_timeout(options.busy_timeout_ms)
                .map_err(into_open_error)?;
        }

        tracing::debug!(encoding = %encoding, "Opened database");
        Ok(conn)
    }

    /// Close the connection.
    ///
    /// Statements still open on this connection are finalized first and
    /// become unusable. Calling `close` again is a no-op. A failure reported
    /// by the engine is returned, but the handle is considered released
    /// either way.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.in_transaction = false;
        let db = std::mem::replace(&mut state.db, ptr::null_mut());
        drop(state);
        *self.interrupt.lock().unwrap_or_else(PoisonError::into_inner) = ptr::null_mut();

        let mut finalized = 0usize;
        // SAFETY: db is valid until sqlite3_close_v2 below; each statement
        // returned by sqlite3_next_stmt is live until we finalize it, and is
        // never touched again by its wrapper once `closed` is set.
        let rc = unsafe {
            loop {
                let stmt = ffi::sqlite3_next_stmt(db, ptr::null_mut());
                if stmt.is_null() {
                    break;
                }
                ffi::sqlite3_finalize(stmt);
                finalized += 1;
            }
            ffi::sqlite3_close_v2(db)
        };

        tracing::debug!(path = %self.path, finalized, "Closed database");
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(Error::Close(SqliteError::new(rc, ffi::error_string(rc))))
        }
    }

    /// Returns `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Text encoding used for SQL and strings on this connection.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn results_as_hash(&self) -> bool {
        self.lock().results_as_hash
    }

    pub fn set_results_as_hash(&self, enabled: bool) {
        self.lock().results_as_hash = enabled;
    }

    pub fn type_translation(&self) -> bool {
        self.lock().type_translation
    }

    pub fn set_type_translation(&self, enabled: bool) {
        self.lock().type_translation = enabled;
    }

    /// This connection's declared-type translator, created on first use.
    pub fn translator(&self) -> Arc<Translator> {
        let mut state = self.lock();
        Arc::clone(
            state
                .translator
                .get_or_insert_with(|| Arc::new(Translator::new())),
        )
    }

    /// Modify this connection's translator.
    ///
    /// Result sets already open keep the table they started with.
    pub fn translator_mut<R>(&self, f: impl FnOnce(&mut Translator) -> R) -> R {
        let mut state = self.lock();
        let translator = state
            .translator
            .get_or_insert_with(|| Arc::new(Translator::new()));
        f(Arc::make_mut(translator))
    }

    /// Translator for a result set starting now, if translation is enabled.
    pub(crate) fn active_translator(&self) -> Option<Arc<Translator>> {
        if self.type_translation() {
            Some(self.translator())
        } else {
            None
        }
    }

    /// Whether `sql` ends in one or more complete statements.
    pub fn complete(&self, sql: &str) -> bool {
        self.driver.complete(sql)
    }

    /// Escape `s` for embedding inside a single-quoted SQL literal.
    pub fn quote(s: &str) -> String {
        s.replace('\'', "''")
    }

    /// Prepare the first statement in `sql`. Nothing is executed.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        Statement::prepare(self, sql)
    }

    /// Prepare a statement, hand it to `f`, and close it afterwards.
    pub fn prepare_with<T, E, F>(&self, sql: &str, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Statement<'_>) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let mut stmt = self.prepare(sql)?;
        let out = f(&mut stmt);
        let closed = stmt.close();
        let out = out?;
        closed?;
        Ok(out)
    }

    /// Execute the first statement in `sql` and collect its rows.
    pub fn execute(&self, sql: &str, params: impl Into<Params>) -> Result<Vec<ResultRow>> {
        let mut stmt = self.prepare(sql)?;
        let rows = match stmt.execute(params) {
            Ok(rs) => rs.collect_rows(),
            Err(e) => Err(e),
        };
        let closed = stmt.close();
        let rows = rows?;
        closed?;
        Ok(rows)
    }

    /// Execute the first statement in `sql`, passing each row to `f`.
    ///
    /// The statement is closed whether `f` returns an error or not.
    pub fn execute_each<E, F>(
        &self,
        sql: &str,
        params: impl Into<Params>,
        mut f: F,
    ) -> std::result::Result<(), E>
    where
        F: FnMut(ResultRow) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        self.prepare_with(sql, |stmt| {
            let rows = stmt.execute(params)?;
            for row in rows {
                f(row?)?;
            }
            Ok(())
        })
    }

    /// Like [`execute`](Self::execute), but the first row holds the column
    /// names. The header is present even when the query returns no rows.
    pub fn execute2(&self, sql: &str, params: impl Into<Params>) -> Result<Vec<Vec<Value>>> {
        self.prepare_with(sql, |stmt| {
            let mut rs = stmt.execute(params)?;
            let header = rs.columns()?.names().iter().map(|n| Value::from(n.as_str())).collect();
            let mut out = vec![header];
            while let Some(row) = rs.next_row()? {
                out.push(row.into_values());
            }
            Ok(out)
        })
    }

    /// Execute every statement in `sql`, in order, with the same parameters.
    ///
    /// Rows produced by any statement are stepped through and discarded.
    /// The first failing statement stops the batch.
    #[tracing::instrument(level = "debug", skip(self, sql, params))]
    pub fn execute_batch(&self, sql: &str, params: impl Into<Params>) -> Result<()> {
        self.run_batch(sql, &params.into(), false)
    }

    /// Like [`execute_batch`](Self::execute_batch), but a statement that
    /// yields a row fails the batch with [`MisuseKind::RowsInBatch`].
    #[tracing::instrument(level = "debug", skip(self, sql, params))]
    pub fn execute_batch_strict(&self, sql: &str, params: impl Into<Params>) -> Result<()> {
        self.run_batch(sql, &params.into(), true)
    }

    fn run_batch(&self, sql: &str, params: &Params, strict: bool) -> Result<()> {
        let mut sql = sql.trim().to_string();
        while !sql.is_empty() {
            let mut stmt = self.prepare(&sql)?;
            let discarded = stmt.run_to_completion(params, strict)?;
            if discarded > 0 {
                tracing::debug!(sql = %stmt.sql(), discarded, "Discarded rows in batch");
            }
            // prepare either consumes a token or fails, so the remainder shrinks
            let remainder = stmt.remainder().to_string();
            stmt.close()?;
            sql = remainder;
        }
        Ok(())
    }

    /// Execute `sql` and return a live result set.
    ///
    /// The result set owns its statement; close it (or drop it) to release
    /// the cursor.
    pub fn query(&self, sql: &str, params: impl Into<Params>) -> Result<ResultSet<'_, '_>> {
        let mut stmt = Box::new(self.prepare(sql)?);
        stmt.start_execution(&params.into())?;
        Ok(ResultSet::owned(stmt))
    }

    /// Execute `sql`, hand the result set to `f`, and close it afterwards.
    pub fn query_with<T, E, F>(
        &self,
        sql: &str,
        params: impl Into<Params>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut ResultSet<'_, '_>) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let mut rs = self.query(sql, params)?;
        let out = f(&mut rs);
        let closed = rs.close();
        let out = out?;
        closed?;
        Ok(out)
    }

    /// The first row of the result, discarding the rest.
    pub fn get_first_row(&self, sql: &str, params: impl Into<Params>) -> Result<Option<ResultRow>> {
        self.query_with(sql, params, |rs| rs.next_row())
    }

    /// The first value of the first row.
    pub fn get_first_value(&self, sql: &str, params: impl Into<Params>) -> Result<Option<Value>> {
        Ok(self
            .get_first_row(sql, params)?
            .and_then(|row| row.into_values().into_iter().next()))
    }

    /// Begin a transaction.
    ///
    /// Nesting is rejected by the engine itself and surfaces as a step error.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn transaction(&self, mode: TransactionMode) -> Result<bool> {
        self.execute_batch(&format!("BEGIN {} TRANSACTION", mode.as_sql()), ())?;
        self.lock().in_transaction = true;
        tracing::debug!(mode = %mode, "Transaction started");
        Ok(true)
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`. When `f` fails the transaction is
    /// rolled back and `f`'s error is returned; a failing rollback is logged
    /// and does not replace it. A panic in `f` also rolls back.
    pub fn transaction_with<T, E, F>(&self, mode: TransactionMode, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let tx = self.begin(mode)?;
        match f(self) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(error = %rollback_err, "Rollback after failed transaction block failed");
                }
                Err(err)
            }
        }
    }

    /// Begin a transaction that rolls back when dropped unless committed.
    pub fn begin(&self, mode: TransactionMode) -> Result<Transaction<'_>> {
        self.transaction(mode)?;
        Ok(Transaction {
            conn: self,
            finished: false,
        })
    }

    /// Commit the current transaction.
    ///
    /// With no transaction active, the engine's error is returned.
    pub fn commit(&self) -> Result<bool> {
        self.end_transaction("COMMIT TRANSACTION")
    }

    /// Roll back the current transaction.
    ///
    /// With no transaction active, the engine's error is returned.
    pub fn rollback(&self) -> Result<bool> {
        self.end_transaction("ROLLBACK TRANSACTION")
    }

    fn end_transaction(&self, sql: &str) -> Result<bool> {
        let result = self.execute_batch(sql, ());
        // The engine may have ended the transaction on its own (e.g. after a
        // constraint failure), so resync the flag from autocommit state.
        if let Ok(db) = self.handle() {
            // SAFETY: db is open
            let autocommit = unsafe { ffi::sqlite3_get_autocommit(db) } != 0;
            self.lock().in_transaction = !autocommit;
        }
        result?;
        tracing::debug!(sql, "Transaction ended");
        Ok(true)
    }

    /// Returns `true` while a transaction begun through this API is open.
    pub fn transaction_active(&self) -> bool {
        self.lock().in_transaction
    }

    /// Rowid of the most recent successful INSERT.
    pub fn last_insert_row_id(&self) -> Result<i64> {
        let db = self.handle()?;
        // SAFETY: db is open
        Ok(unsafe { ffi::sqlite3_last_insert_rowid(db) })
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE.
    pub fn changes(&self) -> Result<u64> {
        let db = self.handle()?;
        // SAFETY: db is open
        Ok(unsafe { ffi::sqlite3_changes(db) } as u64)
    }

    /// Rows changed since the connection was opened.
    pub fn total_changes(&self) -> Result<u64> {
        let db = self.handle()?;
        // SAFETY: db is open
        Ok(unsafe { ffi::sqlite3_total_changes(db) } as u64)
    }

    /// Ask the engine to abort the statement currently stepping.
    ///
    /// The running step returns an interrupted error. Use
    /// [`interrupt_handle`](Self::interrupt_handle) to interrupt from
    /// another thread.
    pub fn interrupt(&self) -> Result<()> {
        self.handle()?;
        self.interrupt_handle().interrupt();
        Ok(())
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            db: Arc::clone(&self.interrupt),
        }
    }

    /// Let the engine retry for up to `ms` milliseconds on a locked database.
    pub fn busy_timeout(&self, ms: u32) -> Result<()> {
        let db = self.handle()?;
        let ms = c_int::try_from(ms).unwrap_or(c_int::MAX);
        // SAFETY: db is open
        let rc = unsafe { ffi::sqlite3_busy_timeout(db, ms) };
        self.check(rc, None).map_err(Error::Step)
    }

    /// Last error message recorded by the engine.
    pub fn errmsg(&self) -> Result<String> {
        let db = self.handle()?;
        // SAFETY: db is open
        Ok(unsafe { ffi::errmsg(db) })
    }

    /// Last primary result code recorded by the engine.
    pub fn errcode(&self) -> Result<i32> {
        let db = self.handle()?;
        // SAFETY: db is open
        Ok(unsafe { ffi::sqlite3_errcode(db) })
    }

    pub(crate) fn handle(&self) -> Result<*mut ffi::sqlite3> {
        let state = self.lock();
        if state.closed {
            Err(Error::misuse(
                MisuseKind::ConnectionClosed,
                "cannot use a closed database",
            ))
        } else {
            Ok(state.db)
        }
    }

    /// The engine's current error as a [`SqliteError`], or `Ok` for `SQLITE_OK`.
    pub(crate) fn check(&self, rc: c_int, sql: Option<&str>) -> std::result::Result<(), SqliteError> {
        if rc == ffi::SQLITE_OK {
            return Ok(());
        }
        Err(self.last_error(rc, sql))
    }

    /// Build an error for `rc` from the connection's last error state.
    pub(crate) fn last_error(&self, rc: c_int, sql: Option<&str>) -> SqliteError {
        let err = match self.handle() {
            // SAFETY: db is open
            Ok(db) => unsafe {
                SqliteError::new(rc, ffi::errmsg(db))
                    .with_extended_code(ffi::sqlite3_extended_errcode(db))
            },
            Err(_) => SqliteError::new(rc, ffi::error_string(rc)),
        };
        match sql {
            Some(sql) => err.with_sql(sql),
            None => err,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn into_open_error(err: Error) -> Error {
    match err {
        Error::Prepare(e) | Error::Step(e) => Error::Open(e),
        other => other,
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.path, error = %e, "Error closing database on drop");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("encoding", &self.encoding)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// A transaction that rolls back on drop unless committed.
pub struct Transaction<'conn> {
    conn: &'conn Connection,
    finished: bool,
}

impl<'conn> Transaction<'conn> {
    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.conn.commit().map(|_| ())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.conn.rollback().map(|_| ())
    }
}

impl Deref for Transaction<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.conn.is_closed() {
            // Auto-rollback on drop if not committed
            if let Err(e) = self.conn.rollback() {
                tracing::warn!(error = %e, "Rollback on drop failed");
            }
        }
    }
}
