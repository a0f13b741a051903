//! Runtime extension loading.

use crate::connection::Connection;
use crate::ffi;
use litebind_core::{Error, MisuseKind, Result, SqliteError};
use std::ffi::{CString, c_char};
use std::ptr;

impl Connection {
    /// Allow or forbid `load_extension` on this connection.
    pub fn enable_load_extension(&self, enabled: bool) -> Result<()> {
        self.require_extension_support()?;
        let db = self.handle()?;
        // SAFETY: db is open
        let rc = unsafe { ffi::sqlite3_enable_load_extension(db, i32::from(enabled)) };
        self.check(rc, None).map_err(Error::Step)?;
        tracing::debug!(enabled, "Extension loading toggled");
        Ok(())
    }

    pub fn disable_load_extension(&self) -> Result<()> {
        self.enable_load_extension(false)
    }

    /// Load a shared-library extension into this connection.
    ///
    /// Loading must have been enabled with
    /// [`enable_load_extension`](Self::enable_load_extension).
    pub fn load_extension(&self, path: &str, entry_point: Option<&str>) -> Result<()> {
        self.require_extension_support()?;
        let db = self.handle()?;
        let c_path =
            CString::new(path).map_err(|_| Error::config("Invalid path: contains null byte"))?;
        let c_entry = entry_point
            .map(CString::new)
            .transpose()
            .map_err(|_| Error::config("Invalid entry point: contains null byte"))?;

        let mut message: *mut c_char = ptr::null_mut();
        // SAFETY: db is open; strings are NUL-terminated and outlive the call;
        // the engine allocates `message` with sqlite3_malloc
        let (rc, message) = unsafe {
            let rc = ffi::sqlite3_load_extension(
                db,
                c_path.as_ptr(),
                c_entry.as_ref().map_or(ptr::null(), |e| e.as_ptr()),
                &mut message,
            );
            let text = ffi::cstr_owned(message);
            if !message.is_null() {
                ffi::sqlite3_free(message.cast());
            }
            (rc, text)
        };

        if rc != ffi::SQLITE_OK {
            let err = match message {
                Some(message) => SqliteError::new(rc, message),
                None => self.last_error(rc, None),
            };
            tracing::debug!(path, error = %err, "Extension load failed");
            return Err(Error::Step(err));
        }
        tracing::debug!(path, "Loaded extension");
        Ok(())
    }

    fn require_extension_support(&self) -> Result<()> {
        if self.driver().extension_support() {
            Ok(())
        } else {
            Err(Error::misuse(
                MisuseKind::Unsupported,
                "extensions API not supported",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_extension() {
        let conn = Connection::open_memory().unwrap();
        if !conn.driver().extension_support() {
            let err = conn.enable_load_extension(true).unwrap_err();
            assert!(matches!(
                err,
                Error::Misuse(ref m) if m.kind == MisuseKind::Unsupported
            ));
            return;
        }

        conn.enable_load_extension(true).unwrap();
        let err = conn
            .load_extension("/nonexistent/libnothing", None)
            .unwrap_err();
        assert!(matches!(err, Error::Step(_)));
        assert!(!err.message().is_empty());
        conn.disable_load_extension().unwrap();
    }
}
