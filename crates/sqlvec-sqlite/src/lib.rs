//! Vector search for SQLite
//!
//! Registers the `vec_*` scalar functions and the `vec0` virtual table on a
//! [`rusqlite::Connection`], or as a loadable extension through
//! `sqlite3_vec_init`.
//!
//! ```
//! use rusqlite::Connection;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! sqlvec_sqlite::init(&conn).unwrap();
//!
//! conn.execute_batch(
//!     "CREATE VIRTUAL TABLE items USING vec0(embedding float[2]);
//!      INSERT INTO items(rowid, embedding) VALUES (1, '[0, 0]'), (2, '[1, 1]');",
//! )
//! .unwrap();
//!
//! let rowid: i64 = conn
//!     .query_row(
//!         "SELECT rowid FROM items WHERE embedding MATCH '[0.9, 0.9]' ORDER BY distance LIMIT 1",
//!         [],
//!         |row| row.get(0),
//!     )
//!     .unwrap();
//! assert_eq!(rowid, 2);
//! ```

pub mod extension;
pub mod functions;
pub mod vtab;

pub use extension::{init, init_with_config, sqlite3_vec_init, VERSION};
pub use functions::register_functions;
pub use vtab::register_module;
pub use vtab::schema::{ColumnDef, ColumnKind, CompanionColumn, SqlType, TableSchema, VectorColumn};
pub use vtab::table::{decode_vector, Filter, FilterOp, KnnQuery, Vec0Table};

pub use sqlvec_core::{
    DistanceMetric, ElementType, ExtensionConfig, Neighbor, Result, VecError, Vector,
};
