//! vec0 Semantic Search Example
//!
//! This example demonstrates:
//! - Registering the extension on a connection
//! - Creating a vec0 table with metadata and auxiliary columns
//! - KNN queries with and without metadata filters
//! - Reading distances through the scalar functions
//!
//! Run with: cargo run --example semantic_search

use rusqlite::{params, Connection};
use sqlvec_sqlite::Vector;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("sqlvec_sqlite=debug")
        .init();

    let temp_dir = tempfile::tempdir()?;
    let db_path = temp_dir.path().join("articles.db");
    let conn = Connection::open(&db_path)?;
    sqlvec_sqlite::init(&conn)?;

    // ========================================
    // 1. Schema
    // ========================================
    println!("📂 Creating articles table at {}", db_path.display());
    conn.execute_batch(
        "CREATE VIRTUAL TABLE articles USING vec0(
            embedding float[4] distance_metric=cosine,
            section text,
            +title text
        )",
    )?;

    // Toy 4-dimensional "embeddings": [tech, sports, food, travel]
    let articles: [(&str, &str, [f32; 4]); 6] = [
        ("tech", "Rust 2.0 released", [0.9, 0.0, 0.1, 0.0]),
        ("tech", "SQLite turns 25", [0.8, 0.1, 0.0, 0.1]),
        ("sports", "Marathon record broken", [0.0, 0.9, 0.1, 0.2]),
        ("food", "The perfect ramen", [0.0, 0.0, 0.9, 0.3]),
        ("travel", "Street food of Osaka", [0.1, 0.0, 0.7, 0.7]),
        ("travel", "Cycling the Alps", [0.0, 0.6, 0.0, 0.8]),
    ];

    // ========================================
    // 2. Inserts
    // ========================================
    let tx = conn.unchecked_transaction()?;
    for (section, title, embedding) in &articles {
        tx.execute(
            "INSERT INTO articles(embedding, section, title) VALUES (?1, ?2, ?3)",
            params![Vector::from(embedding.to_vec()).to_blob(), section, title],
        )?;
    }
    tx.commit()?;
    println!("   ✅ Inserted {} articles\n", articles.len());

    // ========================================
    // 3. KNN
    // ========================================
    let query = Vector::from(vec![0.1f32, 0.0, 0.8, 0.5]).to_blob();

    println!("🔎 Closest to \"food abroad\":");
    let mut stmt = conn.prepare(
        "SELECT rowid, distance, title FROM articles
         WHERE embedding MATCH ?1
         ORDER BY distance LIMIT 3",
    )?;
    let rows = stmt.query_map(params![query], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?, row.get::<_, String>(2)?))
    })?;
    for row in rows {
        let (rowid, distance, title) = row?;
        println!("   #{rowid} {distance:.4}  {title}");
    }

    println!("\n🔎 Same query, travel section only:");
    let mut stmt = conn.prepare(
        "SELECT rowid, distance, title FROM articles
         WHERE embedding MATCH ?1 AND section = 'travel'
         ORDER BY distance LIMIT 3",
    )?;
    let rows = stmt.query_map(params![query], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?, row.get::<_, String>(2)?))
    })?;
    for row in rows {
        let (rowid, distance, title) = row?;
        println!("   #{rowid} {distance:.4}  {title}");
    }

    // ========================================
    // 4. Scalar functions
    // ========================================
    let (version, similarity): (String, f64) = conn.query_row(
        "SELECT vec_version(), 1.0 - vec_distance_cosine(
             (SELECT embedding FROM articles WHERE rowid = 1),
             (SELECT embedding FROM articles WHERE rowid = 2))",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    println!("\n📐 sqlvec {version}: similarity(#1, #2) = {similarity:.4}");

    Ok(())
}
