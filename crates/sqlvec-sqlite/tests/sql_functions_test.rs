use rusqlite::{params, Connection};
use sqlvec_sqlite::{init, Vector, VERSION};

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init(&conn).unwrap();
    conn
}

fn query_f64(conn: &Connection, sql: &str) -> f64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn query_text(conn: &Connection, sql: &str) -> String {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn query_err(conn: &Connection, sql: &str) -> String {
    conn.query_row(sql, [], |row| row.get::<_, rusqlite::types::Value>(0))
        .unwrap_err()
        .to_string()
}

#[test]
fn test_version_is_stable() {
    let conn = setup();
    let first = query_text(&conn, "SELECT vec_version()");
    let second = query_text(&conn, "SELECT vec_version()");
    assert_eq!(first, second);
    assert_eq!(first, VERSION);
    assert_eq!(first, format!("v{}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_distance_properties() {
    let conn = setup();
    assert_eq!(query_f64(&conn, "SELECT vec_distance_l2('[1, 2, 3]', '[1, 2, 3]')"), 0.0);
    assert_eq!(
        query_f64(&conn, "SELECT vec_distance_l1('[1, 2]', '[4, 6]')"),
        query_f64(&conn, "SELECT vec_distance_l1('[4, 6]', '[1, 2]')")
    );
    let orthogonal = query_f64(&conn, "SELECT vec_distance_cosine('[1, 0]', '[0, 1]')");
    assert!((orthogonal - 1.0).abs() < 1e-9);
    let l2 = query_f64(&conn, "SELECT vec_distance_l2('[0, 0]', '[3, 4]')");
    assert!((l2 - 5.0).abs() < 1e-9);
}

#[test]
fn test_hamming() {
    let conn = setup();
    let d: f64 = conn
        .query_row(
            "SELECT vec_distance_hamming(?1, ?2)",
            params![vec![0b1010_1010u8], vec![0b0101_0101u8]],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(d, 8.0);

    let d = query_f64(&conn, "SELECT vec_distance_hamming('[1, 2, 3]', '[1, 0, 3]', 'int8')");
    assert_eq!(d, 1.0);

    let err = query_err(&conn, "SELECT vec_distance_hamming('[1.5]', '[1.5]', 'float32')");
    assert!(err.contains("Unsupported"), "{}", err);
}

#[test]
fn test_normalize() {
    let conn = setup();
    let json = query_text(&conn, "SELECT vec_to_json(vec_normalize('[3, 4]'))");
    assert_eq!(json, "[0.6,0.8]");

    let err = query_err(&conn, "SELECT vec_normalize('[0, 0]')");
    assert!(err.contains("Zero-norm"), "{}", err);
}

#[test]
fn test_add_sub() {
    let conn = setup();
    assert_eq!(
        query_text(&conn, "SELECT vec_to_json(vec_add('[1, 2]', '[3, 4]'))"),
        "[4.0,6.0]"
    );
    assert_eq!(
        query_text(&conn, "SELECT vec_to_json(vec_sub('[1, 2]', '[3, 4]'))"),
        "[-2.0,-2.0]"
    );
    assert_eq!(
        query_text(
            &conn,
            "SELECT vec_to_json(vec_add('[120, -5]', '[100, 5]', 'int8'), 'int8')"
        ),
        "[127,0]"
    );
}

#[test]
fn test_json_round_trip() {
    let conn = setup();
    let blob: Vec<u8> = conn
        .query_row("SELECT vec_from_json('[0.25, -1.5, 3.0]')", [], |row| row.get(0))
        .unwrap();
    assert_eq!(blob, Vector::from(vec![0.25f32, -1.5, 3.0]).to_blob());

    let json: String = conn
        .query_row("SELECT vec_to_json(?1)", params![blob], |row| row.get(0))
        .unwrap();
    assert_eq!(json, "[0.25,-1.5,3.0]");

    let json = query_text(&conn, "SELECT vec_to_json(vec_from_json('[1, 0, 1]', 'bit'), 'bit')");
    assert_eq!(json, "[1,0,1,0,0,0,0,0]");
}

#[test]
fn test_constructors_and_type() {
    let conn = setup();
    assert_eq!(query_text(&conn, "SELECT vec_type(vec_f32('[1, 2]'))"), "float32");
    assert_eq!(
        query_text(&conn, "SELECT vec_type(vec_f64('[1, 2]'), 'float64')"),
        "float64"
    );
    let blob: Vec<u8> = conn
        .query_row("SELECT vec_int8('[1, -1, 127]')", [], |row| row.get(0))
        .unwrap();
    assert_eq!(blob, vec![1u8, 0xFF, 0x7F]);

    let err = query_err(&conn, "SELECT vec_int8('[300]')");
    assert!(err.contains("int8"), "{}", err);
    let err = query_err(&conn, "SELECT vec_f32(X'0000')");
    assert!(err.contains("Invalid vector"), "{}", err);
}

#[test]
fn test_slice_and_quantize() {
    let conn = setup();
    assert_eq!(
        query_text(&conn, "SELECT vec_to_json(vec_slice('[1, 2, 3, 4]', 1, 3))"),
        "[2.0,3.0]"
    );
    let err = query_err(&conn, "SELECT vec_slice('[1, 2]', 1, 5)");
    assert!(err.contains("out of range"), "{}", err);

    let bits: Vec<u8> = conn
        .query_row("SELECT vec_quantize_binary('[1, -1, 0.5, 0, 2, -2, 3, -3]')", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(bits, vec![0b0101_0101u8]);
    assert_eq!(
        query_f64(&conn, "SELECT vec_length(vec_quantize_binary('[1, -1, 2]'), 'bit')"),
        8.0
    );
}

#[test]
fn test_mismatches_are_errors() {
    let conn = setup();
    let err = query_err(&conn, "SELECT vec_distance_l2('[1, 2]', '[1, 2, 3]')");
    assert!(err.contains("Dimension mismatch"), "{}", err);

    let err = query_err(&conn, "SELECT vec_distance_l2(X'0102', X'0102', 'bit')");
    assert!(err.contains("Unsupported"), "{}", err);

    let err = query_err(&conn, "SELECT vec_length(42)");
    assert!(err.contains("not a vector"), "{}", err);
}
