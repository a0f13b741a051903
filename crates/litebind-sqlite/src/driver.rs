//! The driver capability object.
//!
//! A [`Driver`] is built once, up front, and handed to every connection it
//! opens. It names the native backend and records what that backend can do;
//! there is no process-wide lookup table behind it.

use crate::ffi;
use litebind_core::{Error, Result, SqliteError};
use serde::{Deserialize, Serialize};
use std::ffi::{CString, c_int};

/// Native backends a driver can be built over.
///
/// The engine is linked at build time; this enum is the configuration-time
/// choice between linked variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// The engine compiled from the amalgamation bundled with `libsqlite3-sys`.
    #[default]
    Bundled,
}

/// Capabilities of an initialised native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Driver {
    backend: Backend,
    version_number: i32,
    threadsafe: bool,
    extension_support: bool,
}

impl Driver {
    /// Initialise the backend and probe its capabilities.
    pub fn new(backend: Backend) -> Result<Self> {
        // SAFETY: sqlite3_initialize is idempotent and may be called at any time
        let rc = unsafe { ffi::sqlite3_initialize() };
        if rc != ffi::SQLITE_OK {
            return Err(Error::Open(SqliteError::new(rc, ffi::error_string(rc))));
        }

        // SAFETY: plain queries against the initialised library
        let threadsafe = unsafe { ffi::sqlite3_threadsafe() } != 0;
        let driver = Self {
            backend,
            version_number: ffi::version_number(),
            threadsafe,
            extension_support: cfg!(feature = "load_extension")
                && !compile_option_used("OMIT_LOAD_EXTENSION"),
        };
        tracing::debug!(
            backend = ?driver.backend,
            version = ffi::version(),
            threadsafe = driver.threadsafe,
            extension_support = driver.extension_support,
            "Driver initialised"
        );
        Ok(driver)
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Engine version string, e.g. `"3.46.0"`.
    pub fn libversion(&self) -> &'static str {
        ffi::version()
    }

    /// Engine version as `3XXYYZZ`.
    pub fn version_number(&self) -> i32 {
        self.version_number
    }

    /// Whether the engine was compiled with mutexes.
    pub fn threadsafe(&self) -> bool {
        self.threadsafe
    }

    /// Whether connections may load extensions.
    pub fn extension_support(&self) -> bool {
        self.extension_support
    }

    /// Whether `sql` ends in one or more complete statements.
    ///
    /// SQL containing an interior NUL is never complete.
    pub fn complete(&self, sql: &str) -> bool {
        let Ok(c_sql) = CString::new(sql) else {
            return false;
        };
        // SAFETY: c_sql is a valid NUL-terminated string
        unsafe { ffi::sqlite3_complete(c_sql.as_ptr()) != 0 }
    }
}

fn compile_option_used(name: &str) -> bool {
    let Ok(c_name) = CString::new(name) else {
        return false;
    };
    // SAFETY: c_name is a valid NUL-terminated string
    let used: c_int = unsafe { ffi::sqlite3_compileoption_used(c_name.as_ptr()) };
    used != 0
}
