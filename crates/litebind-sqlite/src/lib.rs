//! SQLite client built on the bundled native engine.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! This crate opens connections, prepares statements, binds parameters in
//! UTF-8 or UTF-16 and reads rows back lazily, optionally translating values
//! by their declared column type.
//!
//! # Example
//!
//! ```rust,ignore
//! use litebind_sqlite::{Connection, Value, params};
//!
//! let conn = Connection::open_memory()?;
//! conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", ())?;
//! conn.execute("INSERT INTO users (name) VALUES (?)", params!["Alice"])?;
//!
//! for row in conn.query("SELECT id, name FROM users", ())? {
//!     let row = row?;
//!     println!("{}: {}", row[0], row[1]);
//! }
//! ```
//!
//! # Type Mapping
//!
//! | Rust Value | SQLite storage |
//! |-----------|-------------|
//! | `Value::Null` | NULL |
//! | `Value::Integer`, `Value::Bool` | INTEGER |
//! | `Value::Float` | REAL |
//! | `Value::Text` | TEXT, or BLOB if its charset is unknown |
//! | `Value::Blob` | BLOB |
//! | `Value::Date`, `Time`, `DateTime`, `Decimal` | TEXT |
//!
//! # Threads
//!
//! A `Connection` can move between threads but not be shared; use
//! [`Connection::interrupt_handle`] to stop a running statement from
//! elsewhere.

pub mod connection;
pub mod driver;
#[cfg(feature = "load_extension")]
pub mod extensions;
pub mod ffi;
pub mod pragmas;
pub mod result_set;
pub mod statement;
pub mod types;

pub use connection::{
    Connection, InterruptHandle, MEMORY, OpenFlags, OpenOptions, Transaction, TransactionMode,
};
pub use driver::{Backend, Driver};
pub use litebind_core::{
    ColumnInfo, Encoding, Error, ErrorClass, FromValue, MisuseKind, Result, ResultRow, Row,
    SqliteError, Text, Translator, Value,
};
pub use result_set::{ResultSet, first_column};
pub use statement::{ParamKey, Params, Statement, StatementState, StepResult};

/// Build [`Params`] inline.
///
/// `params![a, b]` binds positionally; `params!["name" => a]` binds by name.
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::None
    };
    ($($name:literal => $value:expr),+ $(,)?) => {
        $crate::Params::Named(vec![$((::std::string::String::from($name), $crate::Value::from($value))),+])
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Params::Positional(vec![$($crate::Value::from($value)),+])
    };
}

/// Version string of the linked engine.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Version of the linked engine as `3XXYYZZ`.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
