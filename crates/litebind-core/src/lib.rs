//! Core types for litebind.
//!
//! This crate holds everything that does not touch the native engine:
//!
//! - `Encoding` resolution for text crossing the native boundary
//! - `Value` / `Text`, the decoded form of a column or bound parameter
//! - `Row`, `ResultRow` and shared `ColumnInfo`
//! - `Translator`, the pluggable declared-type conversion table
//! - `Error`, the crate-wide error taxonomy

pub mod encoding;
pub mod error;
pub mod row;
pub mod translate;
pub mod value;

pub use encoding::Encoding;
pub use error::{
    BindError, ConfigError, Error, ErrorClass, MisuseError, MisuseKind, Result, SqliteError,
    TypeError,
};
pub use row::{ColumnInfo, ResultRow, Row};
pub use translate::{Converter, Translator};
pub use value::{FromValue, StorageClass, Text, Value};
