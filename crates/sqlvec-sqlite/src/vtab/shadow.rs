//! Shadow tables that hold the rows of a vec0 table
//!
//! - `<t>_vectors(rowid INTEGER PRIMARY KEY, v00 BLOB, ...)`: read by the KNN scan
//! - `<t>_metadata(rowid INTEGER PRIMARY KEY, m00 <type>, ...)`: one index per column
//! - `<t>_auxiliary(rowid INTEGER PRIMARY KEY, a00 <type>, ...)`
//!
//! The metadata and auxiliary tables only exist when the vec0 table declares
//! columns of that kind.

use super::schema::{quote_identifier, ColumnKind, TableSchema};
use super::table::FilterOp;

/// One shadow table and the declared columns it stores
#[derive(Debug, Clone)]
pub(crate) struct ShadowPart {
    /// Unquoted table name, e.g. `docs_vectors`
    pub name: String,
    /// `"main"."docs_vectors"`
    pub qualified: String,
    /// Declared column index for each stored column, in shadow order
    pub columns: Vec<usize>,
    /// Shadow column names (`v00`, `m00`, ...) with declared types
    pub stored: Vec<(String, &'static str)>,
    pub insert_sql: String,
    pub update_sql: String,
    pub delete_sql: String,
}

impl ShadowPart {
    fn new(db: &str, table_name: &str, suffix: &str, columns: Vec<usize>, stored: Vec<(String, &'static str)>) -> Self {
        let name = format!("{}_{}", table_name, suffix);
        let qualified = format!("{}.{}", quote_identifier(db), quote_identifier(&name));

        let names: Vec<String> = stored.iter().map(|(n, _)| quote_identifier(n)).collect();
        let placeholders: Vec<String> = (0..names.len()).map(|i| format!("?{}", i + 2)).collect();
        let insert_sql = format!(
            "INSERT INTO {}(rowid, {}) VALUES (?1, {})",
            qualified,
            names.join(", "),
            placeholders.join(", ")
        );
        let assignments: Vec<String> = names
            .iter()
            .zip(&placeholders)
            .map(|(n, p)| format!("{} = {}", n, p))
            .collect();
        let update_sql = format!(
            "UPDATE {} SET {} WHERE rowid = ?1",
            qualified,
            assignments.join(", ")
        );
        let delete_sql = format!("DELETE FROM {} WHERE rowid = ?1", qualified);

        Self {
            name,
            qualified,
            columns,
            stored,
            insert_sql,
            update_sql,
            delete_sql,
        }
    }

    fn create_sql(&self, db: &str, indexed: bool) -> String {
        let mut sql = format!("CREATE TABLE {}(rowid INTEGER PRIMARY KEY", self.qualified);
        for (name, declared) in &self.stored {
            sql.push_str(&format!(", {} {}", quote_identifier(name), declared));
        }
        sql.push_str(");\n");
        if indexed {
            for (name, _) in &self.stored {
                sql.push_str(&format!(
                    "CREATE INDEX {}.{} ON {}({});\n",
                    quote_identifier(db),
                    quote_identifier(&format!("{}_{}", self.name, name)),
                    quote_identifier(&self.name),
                    quote_identifier(name)
                ));
            }
        }
        sql
    }
}

/// SQL for every shadow table of one vec0 table
#[derive(Debug, Clone)]
pub(crate) struct ShadowTables {
    db: String,
    pub vectors: ShadowPart,
    pub metadata: Option<ShadowPart>,
    pub auxiliary: Option<ShadowPart>,
    /// `SELECT <col> FROM <part> WHERE rowid = ?1`, per declared column
    pub select_column: Vec<String>,
    pub exists_sql: String,
    pub next_rowid_sql: String,
    pub scan_sql: String,
    pub count_sql: String,
}

impl ShadowTables {
    pub fn new(schema: &TableSchema) -> Self {
        let db = schema.db_name.as_str();
        let table = schema.table_name.as_str();

        let mut parts: [(Vec<usize>, Vec<(String, &'static str)>); 3] = Default::default();
        let mut locations = Vec::with_capacity(schema.columns.len());
        for (index, column) in schema.columns.iter().enumerate() {
            let (part, shadow_name, declared) = match &column.kind {
                ColumnKind::Vector(v) => (0, format!("v{:02}", v.slot), "BLOB"),
                ColumnKind::Metadata(m) => (1, format!("m{:02}", m.slot), m.sql_type.affinity()),
                ColumnKind::Auxiliary(a) => (2, format!("a{:02}", a.slot), a.sql_type.affinity()),
            };
            parts[part].0.push(index);
            parts[part].1.push((shadow_name.clone(), declared));
            locations.push((part, shadow_name));
        }
        let [vector_part, metadata_part, auxiliary_part] = parts;

        let vectors = ShadowPart::new(db, table, "vectors", vector_part.0, vector_part.1);
        let metadata = (!metadata_part.0.is_empty())
            .then(|| ShadowPart::new(db, table, "metadata", metadata_part.0, metadata_part.1));
        let auxiliary = (!auxiliary_part.0.is_empty())
            .then(|| ShadowPart::new(db, table, "auxiliary", auxiliary_part.0, auxiliary_part.1));

        let select_column = locations
            .iter()
            .map(|(part, shadow_name)| {
                let qualified = match part {
                    0 => &vectors.qualified,
                    1 => &metadata.as_ref().unwrap_or(&vectors).qualified,
                    _ => &auxiliary.as_ref().unwrap_or(&vectors).qualified,
                };
                format!(
                    "SELECT {} FROM {} WHERE rowid = ?1",
                    quote_identifier(shadow_name),
                    qualified
                )
            })
            .collect();

        Self {
            db: db.to_string(),
            exists_sql: format!("SELECT 1 FROM {} WHERE rowid = ?1", vectors.qualified),
            next_rowid_sql: format!("SELECT COALESCE(MAX(rowid), 0) + 1 FROM {}", vectors.qualified),
            scan_sql: format!("SELECT rowid FROM {} ORDER BY rowid", vectors.qualified),
            count_sql: format!("SELECT COUNT(*) FROM {}", vectors.qualified),
            vectors,
            metadata,
            auxiliary,
            select_column,
        }
    }

    pub fn parts(&self) -> impl Iterator<Item = &ShadowPart> {
        std::iter::once(&self.vectors)
            .chain(self.metadata.as_ref())
            .chain(self.auxiliary.as_ref())
    }

    pub fn create_sql(&self) -> String {
        let mut sql = self.vectors.create_sql(&self.db, false);
        if let Some(metadata) = &self.metadata {
            sql.push_str(&metadata.create_sql(&self.db, true));
        }
        if let Some(auxiliary) = &self.auxiliary {
            sql.push_str(&auxiliary.create_sql(&self.db, false));
        }
        sql
    }

    /// Drops all three names so a partially created table is cleaned up too
    pub fn drop_sql(schema: &TableSchema) -> String {
        ["vectors", "metadata", "auxiliary"]
            .iter()
            .map(|suffix| {
                format!(
                    "DROP TABLE IF EXISTS {}.{};\n",
                    quote_identifier(&schema.db_name),
                    quote_identifier(&format!("{}_{}", schema.table_name, suffix))
                )
            })
            .collect()
    }

    /// Candidate rows for a KNN scan: `(rowid, vector)` with the metadata
    /// filters applied in SQL. Filter values bind to `?1..?n` in order.
    pub fn knn_sql(&self, vector_slot: usize, filters: &[(usize, FilterOp)]) -> String {
        let vector = quote_identifier(&format!("v{:02}", vector_slot));
        let mut sql = format!("SELECT v.rowid, v.{} FROM {} AS v", vector, self.vectors.qualified);
        if let (Some(metadata), false) = (&self.metadata, filters.is_empty()) {
            sql.push_str(&format!(" JOIN {} AS m ON m.rowid = v.rowid", metadata.qualified));
        }
        sql.push_str(&format!(" WHERE v.{} IS NOT NULL", vector));
        for (i, (slot, op)) in filters.iter().enumerate() {
            sql.push_str(&format!(
                " AND m.{} {} ?{}",
                quote_identifier(&format!("m{:02}", slot)),
                op.as_sql(),
                i + 1
            ));
        }
        sql
    }
}
