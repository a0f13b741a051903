//! litebind - a synchronous SQLite access layer.
//!
//! litebind provides:
//!
//! - Connections over the bundled native engine, in UTF-8 or UTF-16
//! - Prepared statements with positional and named parameter binding
//! - Lazy, single-pass result sets yielding positional or named rows
//! - Optional translation of values by declared column type
//! - Transactions with automatic rollback on failure
//!
//! # Quick Start
//!
//! ```ignore
//! use litebind::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let conn = Connection::open(&OpenOptions::memory().type_translation(true))?;
//!     conn.execute_batch(
//!         "CREATE TABLE heroes (id INTEGER PRIMARY KEY, name TEXT, born DATE);",
//!         (),
//!     )?;
//!
//!     conn.transaction_with(TransactionMode::Immediate, |c| {
//!         c.execute(
//!             "INSERT INTO heroes (name, born) VALUES (:name, :born)",
//!             params!["name" => "Spider-Man", "born" => "2001-08-10"],
//!         )
//!     })?;
//!
//!     let mut stmt = conn.prepare("SELECT name, born FROM heroes WHERE id = ?")?;
//!     for row in stmt.execute(params![1])? {
//!         let row = row?;
//!         println!("{} was born on {}", row[0], row[1]);
//!     }
//!     Ok(())
//! }
//! ```

pub use litebind_core::{
    BindError, ColumnInfo, ConfigError, Converter, Encoding, Error, ErrorClass, FromValue,
    MisuseError, MisuseKind, Result, ResultRow, Row, SqliteError, StorageClass, Text, Translator,
    TypeError, Value,
};
pub use litebind_sqlite::{
    Backend, Connection, Driver, InterruptHandle, MEMORY, OpenFlags, OpenOptions, ParamKey,
    Params, ResultSet, Statement, StatementState, StepResult, Transaction, TransactionMode,
    first_column, params, sqlite_version, sqlite_version_number,
};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use litebind::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Connections
        Connection,
        Encoding,
        Error,
        FromValue,
        OpenFlags,
        OpenOptions,
        Params,
        Result,
        ResultRow,
        ResultSet,
        Row,
        // Statements
        Statement,
        StepResult,
        Text,
        Transaction,
        TransactionMode,
        Translator,
        Value,
        // Macros
        params,
    };
}
