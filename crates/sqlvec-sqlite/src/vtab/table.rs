//! Storage engine of one vec0 table, usable with or without SQL

use super::schema::{ColumnKind, TableSchema, VectorColumn};
use super::shadow::{ShadowPart, ShadowTables};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sqlvec_core::{
    observe, DistanceMetric, ExtensionConfig, Neighbor, Result, TopK, VecError, Vector,
};
use std::time::Instant;

/// Comparison applied to a metadata column before distances are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FilterOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Declared column index; must be a metadata column
    pub column: usize,
    pub op: FilterOp,
    pub value: Value,
}

/// A nearest-neighbor request against one vector column
#[derive(Debug, Clone, PartialEq)]
pub struct KnnQuery {
    pub column: usize,
    pub vector: Vector,
    /// `None` returns every candidate, closest first
    pub k: Option<usize>,
    pub filters: Vec<Filter>,
}

impl KnnQuery {
    pub fn new(column: usize, vector: Vector) -> Self {
        Self {
            column,
            vector,
            k: None,
            filters: Vec::new(),
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_filter(mut self, column: usize, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column,
            op,
            value: value.into(),
        });
        self
    }
}

/// Decode a column value as a vector of the column's type and dimension
///
/// Blobs use the binary format, text is parsed as a JSON array, NULL stays
/// NULL. Anything else is rejected.
pub fn decode_vector(column: &VectorColumn, value: ValueRef<'_>) -> Result<Option<Vector>> {
    let vector = match value {
        ValueRef::Null => return Ok(None),
        ValueRef::Blob(blob) => {
            Vector::from_blob(blob, column.element_type, Some(column.dimensions))?
        }
        ValueRef::Text(text) => {
            let text = std::str::from_utf8(text)
                .map_err(|e| VecError::InvalidVector(e.to_string()))?;
            let vector = Vector::from_json(text, column.element_type)?;
            vector.expect_dimensions(column.dimensions)?;
            vector
        }
        ValueRef::Integer(_) | ValueRef::Real(_) => {
            return Err(VecError::InvalidVector(
                "vectors must be given as a BLOB or JSON text".into(),
            ))
        }
    };
    vector.check_finite()?;
    Ok(Some(vector))
}

/// A vec0 table bound to its shadow tables
#[derive(Debug, Clone)]
pub struct Vec0Table {
    schema: TableSchema,
    shadow: ShadowTables,
}

impl Vec0Table {
    /// Attach to shadow tables that already exist
    pub fn connect(schema: TableSchema) -> Self {
        let shadow = ShadowTables::new(&schema);
        Self { schema, shadow }
    }

    /// Create the shadow tables for a new vec0 table
    pub fn create(conn: &Connection, schema: TableSchema) -> Result<Self> {
        let table = Self::connect(schema);
        conn.execute_batch(&table.shadow.create_sql())
            .map_err(|e| VecError::Storage(e.to_string()))?;

        tracing::info!(
            "Created vec0 table {}.{} ({} columns)",
            table.schema.db_name,
            table.schema.table_name,
            table.schema.columns.len()
        );
        Ok(table)
    }

    /// Open an existing vec0 table of the `main` database by name
    pub fn open(conn: &Connection, table_name: &str, config: &ExtensionConfig) -> Result<Self> {
        let sql: Option<String> = conn
            .query_row(
                "SELECT sql FROM main.sqlite_master WHERE type = 'table' AND name = ?1",
                [table_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| VecError::Storage(e.to_string()))?;
        let sql = sql.ok_or_else(|| {
            VecError::Schema(format!("no table named '{}'", table_name))
        })?;
        let schema = TableSchema::from_create_sql("main", table_name, &sql, config)?;
        Ok(Self::connect(schema))
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Drop the shadow tables
    pub fn destroy(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&ShadowTables::drop_sql(&self.schema))
            .map_err(|e| VecError::Storage(e.to_string()))?;
        tracing::info!(
            "Dropped vec0 table {}.{}",
            self.schema.db_name,
            self.schema.table_name
        );
        Ok(())
    }

    /// Validate one value per declared column, encoding vectors to blobs
    fn prepare_row(&self, values: &[Value]) -> Result<Vec<Value>> {
        if values.len() != self.schema.columns.len() {
            return Err(VecError::Schema(format!(
                "expected {} column values, got {}",
                self.schema.columns.len(),
                values.len()
            )));
        }
        self.schema
            .columns
            .iter()
            .zip(values)
            .map(|(column, value)| match &column.kind {
                ColumnKind::Vector(vector_column) => {
                    let decoded = decode_vector(vector_column, ValueRef::from(value)).map_err(
                        |e| match e {
                            VecError::InvalidVector(msg) => VecError::InvalidVector(format!(
                                "column '{}': {}",
                                column.name, msg
                            )),
                            other => other,
                        },
                    )?;
                    Ok(decoded.map_or(Value::Null, |v| Value::Blob(v.to_blob())))
                }
                ColumnKind::Metadata(_) | ColumnKind::Auxiliary(_) => Ok(value.clone()),
            })
            .collect()
    }

    fn write(&self, conn: &Connection, rowid: i64, row: &[Value], update: bool) -> Result<()> {
        for part in self.shadow.parts() {
            let sql = if update { &part.update_sql } else { &part.insert_sql };
            let mut stmt = conn
                .prepare_cached(sql)
                .map_err(|e| VecError::Storage(e.to_string()))?;
            stmt.execute(params_from_iter(part_params(part, rowid, row)))
                .map_err(|e| VecError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    pub fn contains(&self, conn: &Connection, rowid: i64) -> Result<bool> {
        let mut stmt = conn
            .prepare_cached(&self.shadow.exists_sql)
            .map_err(|e| VecError::Storage(e.to_string()))?;
        stmt.exists([rowid])
            .map_err(|e| VecError::Storage(e.to_string()))
    }

    fn next_rowid(&self, conn: &Connection) -> Result<i64> {
        conn.prepare_cached(&self.shadow.next_rowid_sql)
            .and_then(|mut stmt| stmt.query_row([], |row| row.get(0)))
            .map_err(|e| VecError::Storage(e.to_string()))
    }

    /// Insert a row; `values` holds one entry per declared column.
    /// Returns the rowid, assigned as `max(rowid) + 1` when not given.
    pub fn insert(&self, conn: &Connection, rowid: Option<i64>, values: &[Value]) -> Result<i64> {
        let row = self.prepare_row(values)?;
        let rowid = match rowid {
            Some(rowid) if self.contains(conn, rowid)? => {
                return Err(VecError::UniqueConstraint(rowid))
            }
            Some(rowid) => rowid,
            None => self.next_rowid(conn)?,
        };
        self.write(conn, rowid, &row, false)?;
        observe::record_mutation("insert");
        Ok(rowid)
    }

    /// Replace every column value of an existing row
    pub fn update(&self, conn: &Connection, rowid: i64, values: &[Value]) -> Result<()> {
        let row = self.prepare_row(values)?;
        if !self.contains(conn, rowid)? {
            return Err(VecError::NotFound(rowid));
        }
        self.write(conn, rowid, &row, true)?;
        observe::record_mutation("update");
        Ok(())
    }

    /// Remove a row; a missing rowid is [`VecError::NotFound`]
    pub fn delete(&self, conn: &Connection, rowid: i64) -> Result<()> {
        if !self.contains(conn, rowid)? {
            return Err(VecError::NotFound(rowid));
        }
        for part in self.shadow.parts() {
            conn.prepare_cached(&part.delete_sql)
                .and_then(|mut stmt| stmt.execute([rowid]))
                .map_err(|e| VecError::Storage(e.to_string()))?;
        }
        observe::record_mutation("delete");
        Ok(())
    }

    /// Value of one declared column; NULL when the row does not exist
    pub fn column_value(&self, conn: &Connection, rowid: i64, column: usize) -> Result<Value> {
        let sql = self.shadow.select_column.get(column).ok_or_else(|| {
            VecError::Schema(format!("column index {} is out of range", column))
        })?;
        let value: Option<Value> = conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.query_row([rowid], |row| row.get(0)).optional())
            .map_err(|e| VecError::Storage(e.to_string()))?;
        Ok(value.unwrap_or(Value::Null))
    }

    /// All declared column values of a row, in declaration order
    pub fn get(&self, conn: &Connection, rowid: i64) -> Result<Option<Vec<Value>>> {
        if !self.contains(conn, rowid)? {
            return Ok(None);
        }
        (0..self.schema.columns.len())
            .map(|column| self.column_value(conn, rowid, column))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Every rowid in ascending order
    pub fn scan(&self, conn: &Connection) -> Result<Vec<i64>> {
        let mut stmt = conn
            .prepare_cached(&self.shadow.scan_sql)
            .map_err(|e| VecError::Storage(e.to_string()))?;
        let rowids = stmt
            .query_map([], |row| row.get(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<i64>>>())
            .map_err(|e| VecError::Storage(e.to_string()))?;
        Ok(rowids)
    }

    pub fn count(&self, conn: &Connection) -> Result<i64> {
        conn.prepare_cached(&self.shadow.count_sql)
            .and_then(|mut stmt| stmt.query_row([], |row| row.get(0)))
            .map_err(|e| VecError::Storage(e.to_string()))
    }

    /// Exact nearest neighbors of `query.vector`, closest first with ties by rowid
    pub fn knn(&self, conn: &Connection, query: &KnnQuery) -> Result<Vec<Neighbor>> {
        let started = Instant::now();
        let column = self.schema.vector_column(query.column)?;
        query.vector.expect_type(column.element_type)?;
        query.vector.expect_dimensions(column.dimensions)?;
        query.vector.check_finite()?;
        if column.metric == DistanceMetric::Cosine && query.vector.is_zero() {
            return Err(VecError::ZeroNorm("cosine distance"));
        }

        let mut top = match query.k {
            Some(k) if k > self.schema.max_k => {
                return Err(VecError::Unsupported(format!(
                    "k = {} exceeds the maximum of {}",
                    k, self.schema.max_k
                )))
            }
            Some(0) => return Ok(Vec::new()),
            Some(k) => TopK::new(k, self.schema.tie_resolution),
            None => TopK::unbounded(self.schema.tie_resolution),
        };

        let filters = query
            .filters
            .iter()
            .map(|filter| self.metadata_slot(filter.column).map(|slot| (slot, filter.op)))
            .collect::<Result<Vec<_>>>()?;
        let sql = self.shadow.knn_sql(column.slot, &filters);

        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| VecError::Storage(e.to_string()))?;
        let mut rows = stmt
            .query(params_from_iter(query.filters.iter().map(|f| &f.value)))
            .map_err(|e| VecError::Storage(e.to_string()))?;

        let mut scanned = 0u64;
        let mut skipped = 0u64;
        while let Some(row) = rows.next().map_err(|e| VecError::Storage(e.to_string()))? {
            scanned += 1;
            let rowid: i64 = row.get(0).map_err(|e| VecError::Storage(e.to_string()))?;
            let blob = match row.get_ref(1).map_err(|e| VecError::Storage(e.to_string()))? {
                ValueRef::Blob(blob) => blob,
                _ => {
                    return Err(VecError::Storage(format!(
                        "rowid {} holds a non-BLOB vector",
                        rowid
                    )))
                }
            };
            let stored = Vector::from_blob(blob, column.element_type, Some(column.dimensions))?;
            match column.metric.distance(&query.vector, &stored) {
                Ok(distance) => {
                    top.push(rowid, distance);
                }
                // cosine is undefined for a stored zero vector; leave the row out
                Err(VecError::ZeroNorm(_)) => skipped += 1,
                Err(e) => return Err(e),
            }
        }

        let neighbors = top.into_sorted_vec();
        tracing::debug!(
            "vec0 knn on {}.{}: scanned {} rows, skipped {}, returned {}",
            self.schema.table_name,
            self.schema.columns[query.column].name,
            scanned,
            skipped,
            neighbors.len()
        );
        observe::record_knn_query(started.elapsed(), scanned, neighbors.len());
        Ok(neighbors)
    }

    fn metadata_slot(&self, column: usize) -> Result<usize> {
        match self.schema.columns.get(column).map(|c| &c.kind) {
            Some(ColumnKind::Metadata(m)) => Ok(m.slot),
            _ => Err(VecError::Unsupported(format!(
                "column {} cannot be used as a filter",
                column
            ))),
        }
    }
}

fn part_params<'a>(part: &'a ShadowPart, rowid: i64, row: &'a [Value]) -> impl Iterator<Item = Value> + 'a {
    std::iter::once(Value::Integer(rowid)).chain(part.columns.iter().map(move |i| row[*i].clone()))
}
