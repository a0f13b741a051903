//! Error types for litebind operations.

use std::fmt;

/// The primary error type for all litebind operations.
///
/// Every failing native call surfaces as one of these variants; the engine's
/// status code and message are carried in [`SqliteError`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The native open call reported a non-success status.
    #[error("could not open database: {0}")]
    Open(SqliteError),
    /// SQL text could not be compiled.
    #[error("failed to prepare statement: {0}")]
    Prepare(SqliteError),
    /// Unknown parameter, or a bind call rejected by the engine.
    #[error("failed to bind parameter: {0}")]
    Bind(BindError),
    /// Stepping a statement failed (SQL error, busy, locked, interrupted, ...).
    #[error("{0}")]
    Step(SqliteError),
    /// Releasing a native handle reported an error.
    #[error("failed to close: {0}")]
    Close(SqliteError),
    /// Unsupported configuration, e.g. an impossible encoding request.
    #[error("configuration error: {0}")]
    Config(ConfigError),
    /// Operation on a closed handle, or a call the current state does not allow.
    #[error("misuse: {0}")]
    Misuse(MisuseError),
    /// Typed extraction from a decoded value failed.
    #[error("type error: {0}")]
    Type(TypeError),
}

/// A failure reported by the native engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteError {
    /// Primary result code (low byte of the extended code).
    pub code: i32,
    /// Extended result code, equal to `code` when the engine gave none.
    pub extended_code: i32,
    /// The engine's last error message for the connection.
    pub message: String,
    /// SQL text being processed when the failure occurred.
    pub sql: Option<String>,
}

/// Coarse classification of native result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Generic SQL error or missing database
    Sql,
    /// Database file is locked by another connection
    Busy,
    /// A table in this connection is locked
    Locked,
    /// Library used incorrectly
    Misuse,
    /// Operation interrupted via `interrupt()`
    Interrupted,
    /// Authorization denied
    Auth,
    /// Constraint violation
    Constraint,
    /// Attempt to write a read-only database
    ReadOnly,
    /// Database image malformed or not a database
    Corrupt,
    /// Unable to open the database file
    CantOpen,
    /// Anything else (I/O, out of memory, ...)
    Other,
}

impl SqliteError {
    /// Create an error from a primary code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: code & 0xff,
            extended_code: code,
            message: message.into(),
            sql: None,
        }
    }

    /// Attach the extended result code.
    pub fn with_extended_code(mut self, extended_code: i32) -> Self {
        self.extended_code = extended_code;
        self
    }

    /// Attach the SQL text that triggered the failure.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Classify the primary code.
    pub fn class(&self) -> ErrorClass {
        match self.code {
            1 => ErrorClass::Sql,
            5 => ErrorClass::Busy,
            6 => ErrorClass::Locked,
            21 => ErrorClass::Misuse,
            9 => ErrorClass::Interrupted,
            3 | 23 => ErrorClass::Auth,
            19 => ErrorClass::Constraint,
            8 => ErrorClass::ReadOnly,
            11 | 26 => ErrorClass::Corrupt,
            14 => ErrorClass::CantOpen,
            _ => ErrorClass::Other,
        }
    }
}

impl fmt::Display for SqliteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// A parameter could not be bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindError {
    /// The parameter as the caller named it (`"3"`, `":name"`, ...).
    pub parameter: String,
    pub message: String,
    /// Native result code, when the engine rejected the bind call.
    pub code: Option<i32>,
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.parameter, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisuseError {
    pub kind: MisuseKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisuseKind {
    /// Connection already closed
    ConnectionClosed,
    /// Statement already closed or finalized by its connection
    StatementClosed,
    /// Result set already closed
    ResultSetClosed,
    /// Stepping a statement whose last step failed, without a reset
    ResetRequired,
    /// A row-producing statement inside a strict batch
    RowsInBatch,
    /// Capability not compiled into the native engine
    Unsupported,
}

impl MisuseError {
    pub fn new(kind: MisuseKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for MisuseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl Error {
    /// Build a misuse error.
    pub fn misuse(kind: MisuseKind, message: impl Into<String>) -> Self {
        Error::Misuse(MisuseError::new(kind, message))
    }

    /// Build a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError::new(message))
    }

    /// The native engine failure behind this error, if any.
    pub fn sqlite_error(&self) -> Option<&SqliteError> {
        match self {
            Error::Open(e) | Error::Prepare(e) | Error::Step(e) | Error::Close(e) => Some(e),
            _ => None,
        }
    }

    /// Primary native result code, if the error came from the engine.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Bind(b) => b.code,
            other => other.sqlite_error().map(|e| e.code),
        }
    }

    /// Classification of the native result code.
    pub fn class(&self) -> Option<ErrorClass> {
        self.sqlite_error().map(SqliteError::class)
    }

    /// The human-readable message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::Open(e) | Error::Prepare(e) | Error::Step(e) | Error::Close(e) => &e.message,
            Error::Bind(e) => &e.message,
            Error::Config(e) => &e.message,
            Error::Misuse(e) => &e.message,
            Error::Type(e) => &e.actual,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        self.sqlite_error().and_then(|e| e.sql.as_deref())
    }

    /// Is this a busy or locked condition (retry may succeed)?
    pub fn is_busy(&self) -> bool {
        matches!(self.class(), Some(ErrorClass::Busy | ErrorClass::Locked))
    }

    /// Is this a misuse of a closed handle or an unsupported call?
    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::Misuse(_)) || self.class() == Some(ErrorClass::Misuse)
    }
}

impl From<BindError> for Error {
    fn from(err: BindError) -> Self {
        Error::Bind(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<MisuseError> for Error {
    fn from(err: MisuseError) -> Self {
        Error::Misuse(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

/// Result type alias for litebind operations.
pub type Result<T> = std::result::Result<T, Error>;
