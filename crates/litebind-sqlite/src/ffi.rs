//! Native call gateway.
//!
//! Re-exports the subset of `libsqlite3-sys` the driver consumes, declares
//! the few entry points those bindings omit, and adds helpers for reading
//! strings the engine hands back. Everything above this module goes
//! through these names only.

#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{CStr, c_char, c_int, c_void};

pub use libsqlite3_sys::{
    SQLITE_BLOB, SQLITE_DONE, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_OK, SQLITE_OPEN_CREATE,
    SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_NOMUTEX, SQLITE_OPEN_PRIVATECACHE, SQLITE_OPEN_READONLY,
    SQLITE_OPEN_READWRITE, SQLITE_OPEN_SHAREDCACHE, SQLITE_OPEN_URI, SQLITE_RANGE, SQLITE_ROW,
    SQLITE_TEXT, SQLITE_TRANSIENT, SQLITE_UTF8, SQLITE_UTF16BE, SQLITE_UTF16LE, sqlite3,
    sqlite3_bind_blob64, sqlite3_bind_double, sqlite3_bind_int64, sqlite3_bind_null,
    sqlite3_bind_parameter_count, sqlite3_bind_parameter_index, sqlite3_bind_text64,
    sqlite3_busy_timeout, sqlite3_changes, sqlite3_clear_bindings, sqlite3_column_blob,
    sqlite3_column_bytes, sqlite3_column_count, sqlite3_column_decltype, sqlite3_column_double,
    sqlite3_column_int64, sqlite3_column_name, sqlite3_column_text, sqlite3_column_type,
    sqlite3_compileoption_used, sqlite3_complete, sqlite3_errcode, sqlite3_errmsg,
    sqlite3_errstr, sqlite3_extended_errcode, sqlite3_finalize, sqlite3_free,
    sqlite3_get_autocommit, sqlite3_initialize, sqlite3_interrupt, sqlite3_last_insert_rowid,
    sqlite3_libversion, sqlite3_libversion_number, sqlite3_next_stmt, sqlite3_open_v2,
    sqlite3_prepare_v2, sqlite3_reset, sqlite3_step, sqlite3_stmt, sqlite3_threadsafe,
    sqlite3_total_changes,
};

// Not generated by libsqlite3-sys (its bindings skip the UTF-16 API and
// close_v2); the symbols live in the same bundled library.
unsafe extern "C" {
    pub fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;

    pub fn sqlite3_prepare16_v2(
        db: *mut sqlite3,
        zSql: *const c_void,
        nByte: c_int,
        ppStmt: *mut *mut sqlite3_stmt,
        pzTail: *mut *const c_void,
    ) -> c_int;

    pub fn sqlite3_column_text16(stmt: *mut sqlite3_stmt, iCol: c_int) -> *const c_void;
    pub fn sqlite3_column_bytes16(stmt: *mut sqlite3_stmt, iCol: c_int) -> c_int;
}

#[cfg(feature = "load_extension")]
pub use libsqlite3_sys::{sqlite3_enable_load_extension, sqlite3_load_extension};

/// Get the SQLite library version as a string.
pub fn version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a static string
    unsafe { cstr_static(sqlite3_libversion()).unwrap_or("unknown") }
}

/// Get the SQLite library version as a number (3XXYYZZ).
pub fn version_number() -> i32 {
    // SAFETY: sqlite3_libversion_number is always safe to call
    unsafe { sqlite3_libversion_number() }
}

/// Convert an SQLite result code to a human-readable string.
pub fn error_string(code: c_int) -> &'static str {
    // SAFETY: sqlite3_errstr returns a static string for every code
    unsafe { cstr_static(sqlite3_errstr(code)).unwrap_or("unknown error") }
}

/// The last error message recorded on a connection handle.
///
/// # Safety
/// `db` must be a valid connection handle (or null, which yields the
/// engine's out-of-memory message).
pub unsafe fn errmsg(db: *mut sqlite3) -> String {
    // SAFETY: caller guarantees db; the returned pointer is owned by the engine
    unsafe { cstr_owned(sqlite3_errmsg(db)).unwrap_or_default() }
}

/// Copy a NUL-terminated string returned by the engine.
///
/// # Safety
/// `ptr` must be null or point at a NUL-terminated string valid for the
/// duration of the call.
pub unsafe fn cstr_owned(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        // SAFETY: non-null and NUL-terminated per caller contract
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

unsafe fn cstr_static(ptr: *const c_char) -> Option<&'static str> {
    if ptr.is_null() {
        None
    } else {
        // SAFETY: the engine's version and errstr strings are static
        unsafe { CStr::from_ptr(ptr) }.to_str().ok()
    }
}
