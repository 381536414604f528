//! The `vec0` virtual table module
//!
//! Declared columns are followed by two hidden columns, `distance` and `k`.
//! Rows live in shadow tables (see [`table::Vec0Table`]); this module only
//! adapts SQLite's xCreate/xBestIndex/xFilter/xUpdate calls onto it.

pub mod plan;
pub mod schema;
mod shadow;
pub mod table;

use self::plan::{Constraint, ConstraintOp, OrderTerm, PlanArg, QueryPlan};
use self::schema::TableSchema;
use self::table::{decode_vector, Filter, KnnQuery, Vec0Table};
use rusqlite::ffi;
use rusqlite::types::{Null, Value, ValueRef};
use rusqlite::vtab::{
    update_module, Context, CreateVTab, IndexConstraintOp, IndexInfo, UpdateVTab, VTab,
    VTabConnection, VTabCursor, VTabKind, Values,
};
use rusqlite::Connection;
use sqlvec_core::{ExtensionConfig, Result, VecError};
use std::marker::PhantomData;
use std::os::raw::c_int;

/// Register the module on `conn` under `config.module_name`
pub fn register_module(conn: &Connection, config: ExtensionConfig) -> Result<()> {
    let name = config.module_name.clone();
    conn.create_module(name.as_str(), update_module::<Vec0Tab>(), Some(config))
        .map_err(|e| VecError::Storage(e.to_string()))
}

fn module_error(e: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::ModuleError(e.to_string())
}

/// Like [`module_error`], but a duplicate rowid surfaces as `SQLITE_CONSTRAINT`
fn write_error(e: VecError) -> rusqlite::Error {
    match e {
        VecError::UniqueConstraint(_) => rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_CONSTRAINT_PRIMARYKEY),
            Some(e.to_string()),
        ),
        other => module_error(other),
    }
}

fn constraint_op(op: IndexConstraintOp) -> ConstraintOp {
    match op {
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_EQ => ConstraintOp::Eq,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_NE => ConstraintOp::Ne,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_LT => ConstraintOp::Lt,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_LE => ConstraintOp::Le,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_GT => ConstraintOp::Gt,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_GE => ConstraintOp::Ge,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_MATCH => ConstraintOp::Match,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_LIMIT => ConstraintOp::Limit,
        IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_OFFSET => ConstraintOp::Offset,
        _ => ConstraintOp::Other,
    }
}

/// vec0 table instance
#[repr(C)]
pub struct Vec0Tab {
    /// Base class. Must be first
    base: ffi::sqlite3_vtab,
    /// Non-owning handle on the connection the table belongs to
    conn: Connection,
    table: Vec0Table,
}

impl Vec0Tab {
    fn init(
        db: &mut VTabConnection,
        aux: Option<&ExtensionConfig>,
        args: &[&[u8]],
        create: bool,
    ) -> rusqlite::Result<(String, Self)> {
        let args = args
            .iter()
            .map(|arg| std::str::from_utf8(arg))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(module_error)?;
        let default_config = ExtensionConfig::default();
        let config = aux.unwrap_or(&default_config);
        let schema = TableSchema::from_module_args(&args, config).map_err(module_error)?;

        let conn = unsafe { Connection::from_handle(db.handle())? };
        let table = if create {
            Vec0Table::create(&conn, schema).map_err(module_error)?
        } else {
            Vec0Table::connect(schema)
        };

        Ok((
            table.schema().declaration(),
            Vec0Tab {
                base: ffi::sqlite3_vtab::default(),
                conn,
                table,
            },
        ))
    }

    /// Declared column values of an xUpdate call (argv[2..2 + n])
    fn column_values(&self, args: &Values<'_>) -> rusqlite::Result<Vec<Value>> {
        (0..self.table.schema().columns.len())
            .map(|i| args.get::<Value>(i + 2))
            .collect()
    }
}

unsafe impl<'vtab> VTab<'vtab> for Vec0Tab {
    type Aux = ExtensionConfig;
    type Cursor = Vec0Cursor<'vtab>;

    fn connect(
        db: &mut VTabConnection,
        aux: Option<&ExtensionConfig>,
        args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        Self::init(db, aux, args, false)
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        let constraints: Vec<Constraint> = info
            .constraints()
            .map(|c| Constraint {
                column: c.column(),
                op: constraint_op(c.operator()),
                usable: c.is_usable(),
            })
            .collect();
        let order_by: Vec<OrderTerm> = info
            .order_bys()
            .map(|o| OrderTerm {
                column: o.column(),
                desc: o.is_order_by_desc(),
            })
            .collect();

        let choice =
            plan::choose(self.table.schema(), &constraints, &order_by).map_err(module_error)?;
        for (constraint, argv_index) in &choice.usage {
            let mut usage = info.constraint_usage(*constraint);
            usage.set_argv_index(*argv_index);
            usage.set_omit(true);
        }
        let idx_str = choice.plan.to_idx_str().map_err(module_error)?;
        tracing::debug!("vec0 {} plan: {}", self.table.schema().table_name, idx_str);

        info.set_idx_str(&idx_str);
        info.set_order_by_consumed(choice.order_by_consumed);
        info.set_estimated_cost(choice.estimated_cost);
        info.set_estimated_rows(choice.estimated_rows);
        Ok(())
    }

    fn open(&mut self) -> rusqlite::Result<Vec0Cursor<'vtab>> {
        Ok(Vec0Cursor::new())
    }
}

impl<'vtab> CreateVTab<'vtab> for Vec0Tab {
    const KIND: VTabKind = VTabKind::Default;

    fn create(
        db: &mut VTabConnection,
        aux: Option<&ExtensionConfig>,
        args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        Self::init(db, aux, args, true)
    }

    fn destroy(&self) -> rusqlite::Result<()> {
        self.table.destroy(&self.conn).map_err(module_error)
    }
}

impl<'vtab> UpdateVTab<'vtab> for Vec0Tab {
    fn delete(&mut self, arg: ValueRef<'_>) -> rusqlite::Result<()> {
        let rowid = arg
            .as_i64()
            .map_err(|_| module_error("DELETE requires an integer rowid"))?;
        self.table.delete(&self.conn, rowid).map_err(module_error)
    }

    fn insert(&mut self, args: &Values<'_>) -> rusqlite::Result<i64> {
        let rowid = args.get::<Option<i64>>(1)?;
        let values = self.column_values(args)?;
        self.table
            .insert(&self.conn, rowid, &values)
            .map_err(write_error)
    }

    fn update(&mut self, args: &Values<'_>) -> rusqlite::Result<()> {
        let old_rowid = args.get::<i64>(0)?;
        let new_rowid = args.get::<i64>(1)?;
        if old_rowid != new_rowid {
            tracing::warn!(
                "vec0 {}: rejected rowid change {} -> {}",
                self.table.schema().table_name,
                old_rowid,
                new_rowid
            );
            return Err(module_error("changing the rowid of a vec0 row is not supported"));
        }
        let values = self.column_values(args)?;
        self.table
            .update(&self.conn, old_rowid, &values)
            .map_err(write_error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CursorRow {
    rowid: i64,
    distance: Option<f64>,
}

/// Materialized result rows of one xFilter call
#[repr(C)]
pub struct Vec0Cursor<'vtab> {
    /// Base class. Must be first
    base: ffi::sqlite3_vtab_cursor,
    rows: Vec<CursorRow>,
    position: usize,
    phantom: PhantomData<&'vtab Vec0Tab>,
}

impl Vec0Cursor<'_> {
    fn new() -> Self {
        Vec0Cursor {
            base: ffi::sqlite3_vtab_cursor::default(),
            rows: Vec::new(),
            position: 0,
            phantom: PhantomData,
        }
    }

    /// Accessor to the associated virtual table
    fn vtab(&self) -> &Vec0Tab {
        unsafe { &*(self.base.pVtab as *const Vec0Tab) }
    }
}

fn plan_rows(vtab: &Vec0Tab, plan: QueryPlan, args: &Values<'_>) -> Result<Vec<CursorRow>> {
    let table = &vtab.table;
    let conn = &vtab.conn;
    let arg = |i: usize| args.get::<Value>(i).map_err(|e| VecError::Storage(e.to_string()));

    match plan {
        QueryPlan::Scan => Ok(table
            .scan(conn)?
            .into_iter()
            .map(|rowid| CursorRow {
                rowid,
                distance: None,
            })
            .collect()),
        QueryPlan::Point => match arg(0)? {
            Value::Integer(rowid) if table.contains(conn, rowid)? => Ok(vec![CursorRow {
                rowid,
                distance: None,
            }]),
            _ => Ok(Vec::new()),
        },
        QueryPlan::Knn {
            column,
            args: plan_args,
        } => {
            let vector_column = table.schema().vector_column(column)?;
            let mut vector = None;
            let mut k: Option<usize> = None;
            let mut filters = Vec::new();

            for (i, plan_arg) in plan_args.iter().enumerate() {
                let value = arg(i)?;
                match plan_arg {
                    PlanArg::Query => {
                        vector = decode_vector(vector_column, ValueRef::from(&value))?;
                    }
                    PlanArg::K => {
                        let requested = integer_arg("k", &value)?.max(0) as usize;
                        k = Some(k.map_or(requested, |current| current.min(requested)));
                    }
                    // a negative LIMIT means no limit
                    PlanArg::Limit => {
                        let limit = integer_arg("LIMIT", &value)?;
                        if limit >= 0 {
                            let limit = limit as usize;
                            k = Some(k.map_or(limit, |current| current.min(limit)));
                        }
                    }
                    PlanArg::Filter { column, op } => filters.push(Filter {
                        column: *column,
                        op: *op,
                        value,
                    }),
                }
            }

            let vector = vector.ok_or_else(|| {
                VecError::InvalidVector("MATCH needs a non-NULL query vector".into())
            })?;
            let query = KnnQuery {
                column,
                vector,
                k,
                filters,
            };
            Ok(table
                .knn(conn, &query)?
                .into_iter()
                .map(|n| CursorRow {
                    rowid: n.rowid,
                    distance: Some(n.distance),
                })
                .collect())
        }
    }
}

fn integer_arg(name: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        _ => Err(VecError::Unsupported(format!("{} must be an integer", name))),
    }
}

unsafe impl VTabCursor for Vec0Cursor<'_> {
    fn filter(
        &mut self,
        _idx_num: c_int,
        idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        let plan = QueryPlan::from_idx_str(idx_str).map_err(module_error)?;
        let rows = plan_rows(self.vtab(), plan, args).map_err(module_error)?;
        self.rows = rows;
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.position += 1;
        Ok(())
    }

    fn eof(&self) -> bool {
        self.position >= self.rows.len()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let Some(row) = self.rows.get(self.position) else {
            return ctx.set_result(&Null);
        };
        let vtab = self.vtab();
        let schema = vtab.table.schema();
        let index = i as usize;

        if index == schema.distance_column() {
            ctx.set_result(&row.distance)
        } else if index == schema.k_column() {
            ctx.set_result(&Null)
        } else {
            let value = vtab
                .table
                .column_value(&vtab.conn, row.rowid, index)
                .map_err(module_error)?;
            ctx.set_result(&value)
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.rows.get(self.position).map_or(0, |row| row.rowid))
    }
}
