//! Column grammar of `CREATE VIRTUAL TABLE <name> USING vec0(...)`
//!
//! ```text
//! embedding float[384]                      vector column
//! embedding float[384] distance_metric=cosine
//! category text                             ordinary column (filterable, returned)
//! year integer metadata                     same, written explicitly
//! body text auxiliary / +body text          returned only, never filtered
//! tie_resolution=0                          table option
//! ```

use sqlvec_core::{DistanceMetric, ElementType, ExtensionConfig, Result, VecError};

const RESERVED_COLUMNS: [&str; 3] = ["rowid", "distance", "k"];
const MAX_IDENTIFIER_LEN: usize = 128;

/// Storage class of a companion column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
}

impl SqlType {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "integer" | "int" | "bigint" => Some(SqlType::Integer),
            "real" | "float" | "double" => Some(SqlType::Real),
            "text" | "varchar" => Some(SqlType::Text),
            "blob" => Some(SqlType::Blob),
            "boolean" | "bool" => Some(SqlType::Boolean),
            _ => None,
        }
    }

    /// Declared type used in the shadow table and the vtab declaration
    pub fn affinity(&self) -> &'static str {
        match self {
            SqlType::Integer | SqlType::Boolean => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorColumn {
    pub element_type: ElementType,
    pub dimensions: usize,
    pub metric: DistanceMetric,
    /// Position among the vector columns (`v00`, `v01`, ...)
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompanionColumn {
    pub sql_type: SqlType,
    /// Position within its shadow table (`m00` / `a00`, ...)
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    Vector(VectorColumn),
    /// Ordinary and `metadata` columns: stored for filtering and returned
    Metadata(CompanionColumn),
    /// Returned only
    Auxiliary(CompanionColumn),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn as_vector(&self) -> Option<&VectorColumn> {
        match &self.kind {
            ColumnKind::Vector(column) => Some(column),
            _ => None,
        }
    }
}

/// Parsed definition of one vec0 table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub db_name: String,
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
    pub tie_resolution: f64,
    pub max_k: usize,
}

impl TableSchema {
    /// Parse the argument list SQLite hands to xCreate/xConnect:
    /// module name, database name, table name, then one entry per definition
    pub fn from_module_args(args: &[&str], config: &ExtensionConfig) -> Result<Self> {
        match args {
            [_module, db_name, table_name, definitions @ ..] => {
                Self::new(db_name, table_name, definitions, config)
            }
            _ => Err(VecError::Schema(
                "expected module, database and table names".into(),
            )),
        }
    }

    /// Recover the schema of an existing table from its `CREATE VIRTUAL TABLE` text
    pub fn from_create_sql(
        db_name: &str,
        table_name: &str,
        sql: &str,
        config: &ExtensionConfig,
    ) -> Result<Self> {
        let upper = sql.to_ascii_uppercase();
        let using = upper
            .find(" USING ")
            .ok_or_else(|| VecError::Schema(format!("'{}' is not a virtual table", table_name)))?;
        let open = sql[using..]
            .find('(')
            .map(|i| using + i)
            .ok_or_else(|| VecError::Schema("missing column list".into()))?;
        let close = sql
            .rfind(')')
            .filter(|close| *close > open)
            .ok_or_else(|| VecError::Schema("unterminated column list".into()))?;
        let definitions: Vec<&str> = sql[open + 1..close].split(',').collect();
        Self::new(db_name, table_name, &definitions, config)
    }

    pub fn new(
        db_name: &str,
        table_name: &str,
        definitions: &[&str],
        config: &ExtensionConfig,
    ) -> Result<Self> {
        let mut schema = TableSchema {
            db_name: db_name.to_string(),
            table_name: table_name.to_string(),
            columns: Vec::new(),
            tie_resolution: config.tie_resolution,
            max_k: config.max_k,
        };
        let mut slots = [0usize; 3];

        for raw in definitions {
            let definition = normalize_definition(raw);
            if definition.is_empty() {
                continue;
            }
            if let Some((key, value)) = table_option(&definition) {
                schema.apply_option(key, value)?;
                continue;
            }
            let column = parse_column(&definition, config, &mut slots)?;
            if schema
                .columns
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name))
            {
                return Err(VecError::Schema(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
            schema.columns.push(column);
        }

        if slots[0] == 0 {
            return Err(VecError::Schema(format!(
                "vec0 table '{}' needs at least one vector column",
                table_name
            )));
        }
        Ok(schema)
    }

    fn apply_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key.to_ascii_lowercase().as_str() {
            "tie_resolution" => {
                let resolution: f64 = value.parse().map_err(|_| {
                    VecError::Schema(format!("tie_resolution '{}' is not a number", value))
                })?;
                sqlvec_core::config::validate_tie_resolution(resolution)
                    .map_err(|e| VecError::Schema(e.to_string()))?;
                self.tie_resolution = resolution;
                Ok(())
            }
            other => Err(VecError::Schema(format!("unknown table option '{}'", other))),
        }
    }

    /// Index of the hidden `distance` column
    pub fn distance_column(&self) -> usize {
        self.columns.len()
    }

    /// Index of the hidden `k` column
    pub fn k_column(&self) -> usize {
        self.columns.len() + 1
    }

    pub fn vector_column(&self, index: usize) -> Result<&VectorColumn> {
        self.columns
            .get(index)
            .and_then(ColumnDef::as_vector)
            .ok_or_else(|| {
                VecError::Schema(format!("column {} is not a vector column", index))
            })
    }

    /// The `CREATE TABLE` statement declared to SQLite for this table
    pub fn declaration(&self) -> String {
        let mut sql = String::from("CREATE TABLE x(");
        for column in &self.columns {
            let declared = match &column.kind {
                ColumnKind::Vector(_) => "BLOB",
                ColumnKind::Metadata(c) | ColumnKind::Auxiliary(c) => c.sql_type.affinity(),
            };
            sql.push_str(&format!("{} {}, ", quote_identifier(&column.name), declared));
        }
        sql.push_str("distance REAL HIDDEN, k INTEGER HIDDEN)");
        sql
    }
}

/// Double-quote an identifier for SQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn normalize_definition(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.replace(" = ", "=").replace(" =", "=").replace("= ", "=")
}

/// `key=value` where the key is a single word
fn table_option(definition: &str) -> Option<(&str, &str)> {
    let (key, value) = definition.split_once('=')?;
    if key.contains(' ') || value.contains(' ') {
        return None;
    }
    Some((key, value))
}

fn validate_column_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VecError::Schema("column name must not be empty".into()));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(VecError::Schema(format!(
            "column name must be {} characters or fewer, got {}",
            MAX_IDENTIFIER_LEN,
            name.len()
        )));
    }
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(VecError::Schema(format!(
                "column name '{}' must start with a letter or underscore",
                name
            )));
        }
    }
    if let Some(c) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(VecError::Schema(format!(
            "column name '{}' contains invalid character '{}'",
            name, c
        )));
    }
    if RESERVED_COLUMNS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return Err(VecError::Schema(format!(
            "'{}' is reserved and cannot be used as a column name",
            name
        )));
    }
    Ok(())
}

/// Parse one column definition; `slots` counts vector, metadata and
/// auxiliary columns seen so far
fn parse_column(
    definition: &str,
    config: &ExtensionConfig,
    slots: &mut [usize; 3],
) -> Result<ColumnDef> {
    let mut tokens = definition.split(' ');
    let raw_name = tokens.next().unwrap_or_default();
    let (name, plus_auxiliary) = match raw_name.strip_prefix('+') {
        Some(stripped) => (stripped, true),
        None => (raw_name, false),
    };
    validate_column_name(name)?;

    let type_token = tokens
        .next()
        .ok_or_else(|| VecError::Schema(format!("column '{}' is missing a type", name)))?;
    let rest: Vec<&str> = tokens.collect();

    let kind = if let Some(open) = type_token.find('[') {
        if plus_auxiliary {
            return Err(VecError::Schema(format!(
                "vector column '{}' cannot be auxiliary",
                name
            )));
        }
        let column = parse_vector_type(name, &type_token[..open], &type_token[open..], &rest, config)?;
        ColumnKind::Vector(VectorColumn {
            slot: next_slot(&mut slots[0]),
            ..column
        })
    } else {
        let sql_type = SqlType::parse(type_token).ok_or_else(|| {
            VecError::Schema(format!(
                "column '{}' has unsupported type '{}'",
                name, type_token
            ))
        })?;
        let auxiliary = match rest.as_slice() {
            [] => plus_auxiliary,
            [qualifier] if qualifier.eq_ignore_ascii_case("auxiliary") => true,
            [qualifier] if qualifier.eq_ignore_ascii_case("metadata") && !plus_auxiliary => false,
            _ => {
                return Err(VecError::Schema(format!(
                    "unexpected '{}' after column '{}'",
                    rest.join(" "),
                    name
                )))
            }
        };
        if auxiliary {
            ColumnKind::Auxiliary(CompanionColumn {
                sql_type,
                slot: next_slot(&mut slots[2]),
            })
        } else {
            ColumnKind::Metadata(CompanionColumn {
                sql_type,
                slot: next_slot(&mut slots[1]),
            })
        }
    };

    Ok(ColumnDef {
        name: name.to_string(),
        kind,
    })
}

fn next_slot(counter: &mut usize) -> usize {
    let slot = *counter;
    *counter += 1;
    slot
}

/// `float[384]` plus trailing `distance_metric=...`
fn parse_vector_type(
    name: &str,
    element: &str,
    bracket: &str,
    options: &[&str],
    config: &ExtensionConfig,
) -> Result<VectorColumn> {
    let element_type: ElementType = element.parse().map_err(|_| {
        VecError::Schema(format!(
            "column '{}' has unrecognized element type '{}'",
            name, element
        ))
    })?;

    let inner = bracket
        .strip_prefix('[')
        .and_then(|b| b.strip_suffix(']'))
        .ok_or_else(|| {
            VecError::Schema(format!("column '{}' has a malformed dimension", name))
        })?;
    let dimensions: i64 = inner.trim().parse().map_err(|_| {
        VecError::Schema(format!(
            "column '{}' has a non-numeric dimension '{}'",
            name, inner
        ))
    })?;
    if dimensions <= 0 {
        return Err(VecError::Schema(format!(
            "column '{}' must have a positive dimension, got {}",
            name, dimensions
        )));
    }
    if dimensions as u64 > config.max_dimensions as u64 {
        return Err(VecError::Schema(format!(
            "column '{}' has {} dimensions, more than the maximum of {}",
            name, dimensions, config.max_dimensions
        )));
    }

    let mut metric = DistanceMetric::default_for(element_type, config.default_metric);
    for option in options {
        match option.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("distance_metric") => {
                metric = value.parse().map_err(|e: VecError| VecError::Schema(e.to_string()))?;
            }
            _ => {
                return Err(VecError::Schema(format!(
                    "unknown option '{}' on vector column '{}'",
                    option, name
                )))
            }
        }
    }
    if !metric.supports(element_type) {
        return Err(VecError::Schema(format!(
            "distance_metric={} is not supported for {} column '{}'",
            metric, element_type, name
        )));
    }

    Ok(VectorColumn {
        element_type,
        dimensions: dimensions as usize,
        metric,
        slot: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(definitions: &[&str]) -> Result<TableSchema> {
        TableSchema::new("main", "items", definitions, &ExtensionConfig::default())
    }

    #[test]
    fn test_parse_mixed_columns() {
        let schema = parse(&[
            "embedding float[3]",
            " category  TEXT ",
            "year integer metadata",
            "body text auxiliary",
            "+url text",
            "codes bit[12]",
        ])
        .unwrap();

        assert_eq!(schema.columns.len(), 6);
        let embedding = schema.vector_column(0).unwrap();
        assert_eq!(embedding.element_type, ElementType::Float32);
        assert_eq!(embedding.dimensions, 3);
        assert_eq!(embedding.metric, DistanceMetric::L2);
        assert_eq!(embedding.slot, 0);

        let codes = schema.vector_column(5).unwrap();
        assert_eq!(codes.metric, DistanceMetric::Hamming);
        assert_eq!(codes.slot, 1);

        let metadata: Vec<&str> = schema
            .columns
            .iter()
            .filter(|c| matches!(c.kind, ColumnKind::Metadata(_)))
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(metadata, vec!["category", "year"]);
        let auxiliary: Vec<&str> = schema
            .columns
            .iter()
            .filter(|c| matches!(c.kind, ColumnKind::Auxiliary(_)))
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(auxiliary, vec!["body", "url"]);

        assert_eq!(schema.distance_column(), 6);
        assert_eq!(schema.k_column(), 7);
    }

    #[test]
    fn test_distance_metric_option() {
        let schema = parse(&["embedding float[4] distance_metric=cosine"]).unwrap();
        assert_eq!(schema.vector_column(0).unwrap().metric, DistanceMetric::Cosine);

        let schema = parse(&["embedding int8[4] distance_metric = hamming"]).unwrap();
        assert_eq!(schema.vector_column(0).unwrap().metric, DistanceMetric::Hamming);

        assert!(parse(&["embedding float[4] distance_metric=hamming"]).is_err());
        assert!(parse(&["codes bit[8] distance_metric=l2"]).is_err());
        assert!(parse(&["embedding float[4] distance_metric=dot"]).is_err());
    }

    #[test]
    fn test_schema_errors() {
        let cases: &[&[&str]] = &[
            &["category text"],
            &[],
            &["embedding float[0]"],
            &["embedding float[-3]"],
            &["embedding float[abc]"],
            &["embedding float16[3]"],
            &["embedding float[3]", "EMBEDDING float[3]"],
            &["embedding float[3]", "distance real"],
            &["embedding float[3]", "k integer"],
            &["embedding float[3]", "note json"],
            &["embedding float[3]", "note"],
            &["embedding float[9000]"],
            &["embedding float[3]", "note text metadata extra"],
            &["embedding float[3]", "bad-name text"],
            &["embedding float[3]", "colour=blue"],
        ];
        for definitions in cases {
            let err = parse(definitions).unwrap_err();
            assert!(
                matches!(err, VecError::Schema(_)),
                "{:?} should be a schema error, got {:?}",
                definitions,
                err
            );
        }
    }

    #[test]
    fn test_tie_resolution_option() {
        let schema = parse(&["embedding float[3]", "tie_resolution=0"]).unwrap();
        assert_eq!(schema.tie_resolution, 0.0);
        assert_eq!(schema.columns.len(), 1);
        assert!(parse(&["embedding float[3]", "tie_resolution=-1"]).is_err());
        assert!(parse(&["embedding float[3]", "tie_resolution=abc"]).is_err());
    }

    #[test]
    fn test_module_args_and_declaration() {
        let schema = TableSchema::from_module_args(
            &["vec0", "main", "docs", "embedding float[2]", "tag text", "+body text"],
            &ExtensionConfig::default(),
        )
        .unwrap();
        assert_eq!(schema.table_name, "docs");
        assert_eq!(
            schema.declaration(),
            "CREATE TABLE x(\"embedding\" BLOB, \"tag\" TEXT, \"body\" TEXT, \
             distance REAL HIDDEN, k INTEGER HIDDEN)"
        );
    }

    #[test]
    fn test_from_create_sql() {
        let schema = TableSchema::from_create_sql(
            "main",
            "docs",
            "CREATE VIRTUAL TABLE docs USING vec0(embedding float[2] distance_metric=cosine, tag text)",
            &ExtensionConfig::default(),
        )
        .unwrap();
        assert_eq!(schema.columns.len(), 2);
        assert_eq!(schema.vector_column(0).unwrap().metric, DistanceMetric::Cosine);

        assert!(TableSchema::from_create_sql(
            "main",
            "plain",
            "CREATE TABLE plain(a, b)",
            &ExtensionConfig::default()
        )
        .is_err());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("docs"), "\"docs\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
