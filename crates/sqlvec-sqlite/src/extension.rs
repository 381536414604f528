//! Extension registration and the C entry point

use crate::functions::register_functions;
use crate::vtab::register_module;
use rusqlite::{ffi, Connection};
use sqlvec_core::{ExtensionConfig, Result};
use std::os::raw::{c_char, c_int};

/// Version reported by `vec_version()`
pub const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Register every vector function and the `vec0` module on `conn`
///
/// Registration is per connection; call it once for each connection that
/// needs vector support.
///
/// # Example
///
/// ```
/// use rusqlite::Connection;
///
/// let conn = Connection::open_in_memory().unwrap();
/// sqlvec_sqlite::init(&conn).unwrap();
///
/// let version: String = conn
///     .query_row("SELECT vec_version()", [], |row| row.get(0))
///     .unwrap();
/// assert_eq!(version, sqlvec_sqlite::VERSION);
/// ```
pub fn init(conn: &Connection) -> Result<()> {
    init_with_config(conn, ExtensionConfig::default())
}

/// [`init`] with a custom module name, bounds or defaults
pub fn init_with_config(conn: &Connection, config: ExtensionConfig) -> Result<()> {
    config.validate()?;
    let module_name = config.module_name.clone();

    register_functions(conn)?;
    register_module(conn, config)?;

    tracing::info!(
        "Registered sqlvec {} (module {})",
        VERSION,
        module_name
    );
    Ok(())
}

#[cfg(feature = "loadable_extension")]
fn extension_init(conn: Connection) -> rusqlite::Result<bool> {
    init(&conn).map_err(|e| rusqlite::Error::ModuleError(e.to_string()))?;
    Ok(false)
}

/// Entry point for `sqlite3_load_extension` / `.load`
///
/// # Safety
///
/// Must only be called by SQLite's extension loader with a valid database
/// handle and API routines table.
#[cfg(feature = "loadable_extension")]
#[no_mangle]
pub unsafe extern "C" fn sqlite3_vec_init(
    db: *mut ffi::sqlite3,
    pz_err_msg: *mut *mut c_char,
    p_api: *mut ffi::sqlite3_api_routines,
) -> c_int {
    Connection::extension_init2(db, pz_err_msg, p_api, extension_init)
}

/// Entry point for hosts that link the library and call it directly
///
/// `p_api` is unused. On failure `*pz_err_msg` receives a message allocated
/// with `sqlite3_malloc64`, which the caller releases with `sqlite3_free`.
///
/// # Safety
///
/// `db` must be a valid open database handle; `pz_err_msg` must be NULL or
/// point to writable storage for one pointer.
#[cfg(not(feature = "loadable_extension"))]
#[no_mangle]
pub unsafe extern "C" fn sqlite3_vec_init(
    db: *mut ffi::sqlite3,
    pz_err_msg: *mut *mut c_char,
    _p_api: *mut ffi::sqlite3_api_routines,
) -> c_int {
    let result = Connection::from_handle(db)
        .map_err(|e| sqlvec_core::VecError::Storage(e.to_string()))
        .and_then(|conn| init(&conn));
    match result {
        Ok(()) => ffi::SQLITE_OK,
        Err(e) => {
            tracing::error!("sqlvec initialization failed: {}", e);
            write_error(pz_err_msg, &e.to_string());
            ffi::SQLITE_ERROR
        }
    }
}

#[cfg(not(feature = "loadable_extension"))]
unsafe fn write_error(pz_err_msg: *mut *mut c_char, message: &str) {
    if pz_err_msg.is_null() {
        return;
    }
    let len = message.len();
    let buf = ffi::sqlite3_malloc64((len + 1) as u64) as *mut c_char;
    if buf.is_null() {
        return;
    }
    std::ptr::copy_nonoverlapping(message.as_ptr() as *const c_char, buf, len);
    *buf.add(len) = 0;
    *pz_err_msg = buf;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_registers_functions_and_module() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();

        let n: i64 = conn
            .query_row("SELECT vec_length('[1, 2, 3]')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 3);
        conn.execute_batch("CREATE VIRTUAL TABLE t USING vec0(v float[2])")
            .unwrap();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let config = ExtensionConfig::default().with_max_k(0);
        assert!(init_with_config(&conn, config).is_err());

        // nothing was registered
        assert!(conn.prepare("SELECT vec_version()").is_err());
    }

    #[test]
    fn test_custom_module_name() {
        let conn = Connection::open_in_memory().unwrap();
        init_with_config(&conn, ExtensionConfig::default().with_module_name("vectors"))
            .unwrap();
        conn.execute_batch("CREATE VIRTUAL TABLE t USING vectors(v float[2])")
            .unwrap();
        assert!(conn
            .execute_batch("CREATE VIRTUAL TABLE u USING vec0(v float[2])")
            .is_err());
    }

    #[cfg(not(feature = "loadable_extension"))]
    #[test]
    fn test_c_entry_point() {
        let conn = Connection::open_in_memory().unwrap();
        let mut err: *mut c_char = std::ptr::null_mut();
        let rc = unsafe { sqlite3_vec_init(conn.handle(), &mut err, std::ptr::null_mut()) };
        assert_eq!(rc, ffi::SQLITE_OK);
        assert!(err.is_null());

        let v: String = conn
            .query_row("SELECT vec_version()", [], |row| row.get(0))
            .unwrap();
        assert_eq!(v, VERSION);
    }
}
