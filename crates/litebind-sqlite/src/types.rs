//! Value marshalling across the native boundary.
//!
//! SQLite has five storage classes (NULL, INTEGER, REAL, TEXT, BLOB). Binding
//! maps each [`Value`] onto one of them; decoding reads a column back by its
//! storage class tag. Text is moved in the connection's encoding: UTF-8 on
//! UTF-8 connections, native-order UTF-16 on UTF-16 ones.

#![allow(clippy::cast_possible_truncation)]

use crate::ffi;
use litebind_core::{Encoding, StorageClass, Text, Value};
use std::ffi::{c_int, c_uchar};

/// Bind a Value to a prepared statement parameter.
///
/// Text tagged with an unrecognised charset is bound as a blob. Text in a
/// recognised encoding is transcoded to `encoding` first.
///
/// # Safety
/// - `stmt` must be a valid, non-null prepared statement handle
/// - `index` must be a valid 1-based parameter index
pub unsafe fn bind_value(
    stmt: *mut ffi::sqlite3_stmt,
    index: c_int,
    value: &Value,
    encoding: Encoding,
) -> c_int {
    // SAFETY: forwarded caller contract
    unsafe {
        match value {
            Value::Null => ffi::sqlite3_bind_null(stmt, index),

            Value::Integer(v) => ffi::sqlite3_bind_int64(stmt, index, *v),

            Value::Bool(b) => ffi::sqlite3_bind_int64(stmt, index, i64::from(*b)),

            Value::Float(v) => ffi::sqlite3_bind_double(stmt, index, *v),

            Value::Text(t) => match t.encoding() {
                Some(_) => bind_text(stmt, index, &t.transcode(encoding)),
                None => bind_blob(stmt, index, t.as_bytes()),
            },

            Value::Blob(b) => bind_blob(stmt, index, b),

            Value::Date(_) | Value::Time(_) | Value::DateTime(_) | Value::Decimal(_) => {
                let s = value.storage_text().unwrap_or_default();
                bind_text(stmt, index, &Text::encode(&s, encoding))
            }
        }
    }
}

unsafe fn bind_text(stmt: *mut ffi::sqlite3_stmt, index: c_int, text: &Text) -> c_int {
    let flag = match text.encoding() {
        Some(Encoding::Utf16Le) => ffi::SQLITE_UTF16LE,
        Some(Encoding::Utf16Be) => ffi::SQLITE_UTF16BE,
        _ => ffi::SQLITE_UTF8,
    };
    let bytes = text.as_bytes();
    // SAFETY: the engine copies the buffer (SQLITE_TRANSIENT) before returning
    unsafe {
        ffi::sqlite3_bind_text64(
            stmt,
            index,
            bytes.as_ptr().cast(),
            bytes.len() as u64,
            ffi::SQLITE_TRANSIENT(),
            flag as c_uchar,
        )
    }
}

unsafe fn bind_blob(stmt: *mut ffi::sqlite3_stmt, index: c_int, bytes: &[u8]) -> c_int {
    // SAFETY: the engine copies the buffer (SQLITE_TRANSIENT) before returning
    unsafe {
        ffi::sqlite3_bind_blob64(
            stmt,
            index,
            bytes.as_ptr().cast(),
            bytes.len() as u64,
            ffi::SQLITE_TRANSIENT(),
        )
    }
}

/// The storage class of a column in the current row.
///
/// # Safety
/// - `stmt` must be a valid prepared statement that has just returned SQLITE_ROW
/// - `index` must be a valid 0-based column index
pub unsafe fn storage_class(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> StorageClass {
    // SAFETY: forwarded caller contract
    match unsafe { ffi::sqlite3_column_type(stmt, index) } {
        ffi::SQLITE_INTEGER => StorageClass::Integer,
        ffi::SQLITE_FLOAT => StorageClass::Float,
        ffi::SQLITE_TEXT => StorageClass::Text,
        ffi::SQLITE_BLOB => StorageClass::Blob,
        _ => StorageClass::Null,
    }
}

/// Read a column value from a result row.
///
/// Text is read with its reported byte length, never up to a terminator,
/// and tagged with the encoding it was read in.
///
/// # Safety
/// - `stmt` must be a valid prepared statement that has just returned SQLITE_ROW
/// - `index` must be a valid 0-based column index
pub unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int, encoding: Encoding) -> Value {
    // SAFETY: forwarded caller contract; each pointer is read before the
    // next column call can invalidate it
    unsafe {
        match storage_class(stmt, index) {
            StorageClass::Null => Value::Null,

            StorageClass::Integer => Value::Integer(ffi::sqlite3_column_int64(stmt, index)),

            StorageClass::Float => Value::Float(ffi::sqlite3_column_double(stmt, index)),

            StorageClass::Text if encoding.is_utf16() => {
                let ptr = ffi::sqlite3_column_text16(stmt, index);
                let len = ffi::sqlite3_column_bytes16(stmt, index);
                let bytes = copy_bytes(ptr.cast(), len);
                Value::Text(Text::from_bytes(bytes, Encoding::utf16_native()))
            }

            StorageClass::Text => {
                let ptr = ffi::sqlite3_column_text(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                let bytes = copy_bytes(ptr, len);
                Value::Text(Text::from_bytes(bytes, Encoding::Utf8))
            }

            StorageClass::Blob => {
                let ptr = ffi::sqlite3_column_blob(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                Value::Blob(copy_bytes(ptr.cast(), len))
            }
        }
    }
}

unsafe fn copy_bytes(ptr: *const c_uchar, len: c_int) -> Vec<u8> {
    if ptr.is_null() || len <= 0 {
        Vec::new()
    } else {
        // SAFETY: the engine guarantees `len` readable bytes at `ptr`
        unsafe { std::slice::from_raw_parts(ptr, len as usize) }.to_vec()
    }
}

/// Get the column name from a result.
///
/// # Safety
/// - `stmt` must be a valid prepared statement
/// - `index` must be a valid 0-based column index
pub unsafe fn column_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    // SAFETY: forwarded caller contract
    unsafe { ffi::cstr_owned(ffi::sqlite3_column_name(stmt, index)) }
}

/// Get the declared SQL type of a result column, if it maps to a table column.
///
/// # Safety
/// - `stmt` must be a valid prepared statement
/// - `index` must be a valid 0-based column index
pub unsafe fn column_decltype(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    // SAFETY: forwarded caller contract
    unsafe { ffi::cstr_owned(ffi::sqlite3_column_decltype(stmt, index)) }
}
