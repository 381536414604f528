use rusqlite::types::Value;
use rusqlite::{params, Connection};
use sqlvec_sqlite::{init, ExtensionConfig, FilterOp, KnnQuery, Vec0Table, Vector};
use tempfile::tempdir;

fn f32_blob(values: &[f32]) -> Vec<u8> {
    Vector::from(values.to_vec()).to_blob()
}

#[test]
fn test_table_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vectors.db");

    {
        let conn = Connection::open(&path).unwrap();
        init(&conn).unwrap();
        conn.execute_batch(
            "CREATE VIRTUAL TABLE notes USING vec0(embedding float[2], topic text, +body text)",
        )
        .unwrap();
        for (rowid, x, topic) in [(1, 0.0f32, "rust"), (2, 1.0, "sql"), (3, 2.0, "rust")] {
            conn.execute(
                "INSERT INTO notes(rowid, embedding, topic, body) VALUES (?1, ?2, ?3, ?4)",
                params![rowid, f32_blob(&[x, 0.0]), topic, format!("note {}", rowid)],
            )
            .unwrap();
        }
    }

    let conn = Connection::open(&path).unwrap();
    init(&conn).unwrap();

    let rowids: Vec<i64> = conn
        .prepare(
            "SELECT rowid FROM notes WHERE embedding MATCH ?1 AND topic = 'rust' ORDER BY distance LIMIT 5",
        )
        .unwrap()
        .query_map(params![f32_blob(&[1.9, 0.0])], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(rowids, vec![3, 1]);

    let body: String = conn
        .query_row("SELECT body FROM notes WHERE rowid = 2", [], |row| row.get(0))
        .unwrap();
    assert_eq!(body, "note 2");
}

#[test]
fn test_typed_api_on_reopened_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("typed.db");

    {
        let conn = Connection::open(&path).unwrap();
        init(&conn).unwrap();
        conn.execute_batch(
            "CREATE VIRTUAL TABLE docs USING vec0(embedding float[3], year integer)",
        )
        .unwrap();
    }

    // no extension registered: the typed API works on the shadow tables alone
    let conn = Connection::open(&path).unwrap();
    let table = Vec0Table::open(&conn, "docs", &ExtensionConfig::default()).unwrap();
    for i in 1..=4i64 {
        let x = i as f32;
        table
            .insert(
                &conn,
                Some(i),
                &[Value::Blob(f32_blob(&[x, x, x])), Value::Integer(2020 + i)],
            )
            .unwrap();
    }
    assert_eq!(table.count(&conn).unwrap(), 4);

    let query = KnnQuery::new(0, Vector::from(vec![0.0f32, 0.0, 0.0]))
        .with_k(2)
        .with_filter(1, FilterOp::Gt, 2021i64);
    let rowids: Vec<i64> = table
        .knn(&conn, &query)
        .unwrap()
        .into_iter()
        .map(|n| n.rowid)
        .collect();
    assert_eq!(rowids, vec![2, 3]);

    // and SQL sees the same rows once the module is registered
    init(&conn).unwrap();
    let count: i64 = conn
        .query_row("SELECT count(*) FROM docs", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 4);
}

#[test]
fn test_open_unknown_table() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(Vec0Table::open(&conn, "missing", &ExtensionConfig::default()).is_err());
}
