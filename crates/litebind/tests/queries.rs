use litebind::prelude::*;
use litebind::{ErrorClass, MisuseKind};

fn open() -> Connection {
    Connection::open_memory().expect("open sqlite memory db")
}

#[test]
fn five_column_row_decodes_each_storage_class() {
    let conn = open();
    conn.execute_batch(
        "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price REAL, qty INTEGER, note TEXT)",
        (),
    )
    .unwrap();
    conn.execute(
        "INSERT INTO items VALUES (?, ?, ?, ?, ?)",
        params![Value::Null, "text1", 1.22, 42, Value::Null],
    )
    .unwrap();

    let rows = conn.execute("SELECT * FROM items", ()).unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row[0], Value::Integer(1));
    assert_eq!(row[1], Value::from("text1"));
    assert_eq!(row[1].to_string(), "text1");
    assert_eq!(row[2].to_string(), "1.22");
    assert_eq!(row[3].to_string(), "42");
    assert!(row[4].is_null());
}

#[test]
fn bad_query_reports_syntax_error() {
    let conn = open();
    let err = conn.execute("bad query", ()).unwrap_err();
    assert!(matches!(err, Error::Prepare(_)));
    assert!(err.message().contains("near \"bad\": syntax error"));
    assert_eq!(err.code(), Some(1));
    assert_eq!(err.class(), Some(ErrorClass::Sql));
}

#[test]
fn execute_batch_creates_every_table() {
    let conn = open();
    conn.execute_batch("CREATE TABLE t(x);CREATE TABLE u(x);", ())
        .unwrap();
    assert!(conn.execute("SELECT * FROM t", ()).unwrap().is_empty());
    assert!(conn.execute("SELECT * FROM u", ()).unwrap().is_empty());
}

#[test]
fn empty_results_have_no_placeholder_row() {
    let conn = open();
    conn.execute("CREATE TABLE t (a, b)", ()).unwrap();
    assert!(conn.execute("SELECT * FROM t", ()).unwrap().is_empty());

    let with_header = conn.execute2("SELECT * FROM t", ()).unwrap();
    assert_eq!(with_header.len(), 1);
    assert_eq!(with_header[0], vec![Value::from("a"), Value::from("b")]);
}

#[test]
fn unknown_named_parameter_fails() {
    let conn = open();
    conn.execute("CREATE TABLE t (x)", ()).unwrap();
    let err = conn
        .execute("INSERT INTO t VALUES (:x)", params!["y" => 1])
        .unwrap_err();
    assert!(matches!(err, Error::Bind(_)));
    assert!(conn.execute("SELECT * FROM t", ()).unwrap().is_empty());
}

#[test]
fn close_is_idempotent_everywhere() {
    let conn = open();
    let mut stmt = conn.prepare("SELECT 1").unwrap();
    {
        let mut rs = stmt.execute(()).unwrap();
        rs.close().unwrap();
        rs.close().unwrap();
    }
    stmt.close().unwrap();
    stmt.close().unwrap();
    conn.close().unwrap();
    conn.close().unwrap();
}

#[test]
fn closing_connection_invalidates_open_statements() {
    let conn = open();
    let mut a = conn.prepare("SELECT 1").unwrap();
    let mut b = conn.prepare("SELECT 2").unwrap();
    assert_eq!(a.step().unwrap(), StepResult::Row);

    conn.close().unwrap();
    for stmt in [&mut a, &mut b] {
        assert!(stmt.is_closed());
        let err = stmt.execute(()).unwrap_err();
        assert!(matches!(
            err,
            Error::Misuse(ref m) if m.kind == MisuseKind::StatementClosed
        ));
        stmt.close().unwrap();
    }
}

#[test]
fn half_consumed_result_set_releases_its_cursor() {
    let conn = open();
    conn.execute_batch(
        "CREATE TABLE t (x); INSERT INTO t VALUES (1), (2), (3);",
        (),
    )
    .unwrap();
    {
        let mut rs = conn.query("SELECT x FROM t", ()).unwrap();
        assert!(rs.next_row().unwrap().is_some());
    }
    // With the cursor released, a schema change is not blocked.
    conn.execute("DROP TABLE t", ()).unwrap();
}

#[test]
fn execute_each_closes_statement_on_callback_error() {
    let conn = open();
    conn.execute_batch(
        "CREATE TABLE t (x); INSERT INTO t VALUES (1), (2), (3);",
        (),
    )
    .unwrap();

    let mut seen = Vec::new();
    let result: std::result::Result<(), Box<dyn std::error::Error>> =
        conn.execute_each("SELECT x FROM t ORDER BY x", (), |row| {
            seen.push(row[0].clone());
            if seen.len() == 2 {
                Err("stop".into())
            } else {
                Ok(())
            }
        });
    assert_eq!(result.unwrap_err().to_string(), "stop");
    assert_eq!(seen, vec![Value::Integer(1), Value::Integer(2)]);
    conn.execute("DROP TABLE t", ()).unwrap();
}

#[test]
fn named_rows_keep_declaration_order() {
    let conn = Connection::open(&OpenOptions::memory().results_as_hash(true)).unwrap();
    let row = conn
        .get_first_row("SELECT 3 AS c, 1 AS a, 2 AS b", ())
        .unwrap()
        .unwrap();
    let named = row.as_named().unwrap();
    assert_eq!(named.column_names().collect::<Vec<_>>(), ["c", "a", "b"]);
    assert_eq!(named.get_named::<i64>("a").unwrap(), 1);
    assert_eq!(row.to_string(), "{c: 3, a: 1, b: 2}");
}

#[test]
fn quoted_literals_survive() {
    let conn = open();
    let sql = format!("SELECT '{}'", Connection::quote("it's"));
    assert_eq!(
        conn.get_first_value(&sql, ()).unwrap(),
        Some(Value::from("it's"))
    );
}
