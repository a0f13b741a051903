use chrono::{NaiveDate, NaiveTime};
use litebind::prelude::*;

fn open() -> Connection {
    let conn = Connection::open(&OpenOptions::memory().type_translation(true)).unwrap();
    conn.execute_batch(
        "CREATE TABLE events (
            id INTEGER PRIMARY KEY,
            day DATE,
            at TIME,
            active BOOLEAN,
            price DECIMAL(10, 2),
            ratio DOUBLE,
            label VARCHAR(20)
        );
        INSERT INTO events VALUES (1, '2024-02-29', '13:45:00', 't', '19.99', 2, 'first');
        INSERT INTO events VALUES (2, 'not a date', NULL, 0, 5, 0.5, NULL);",
        (),
    )
    .unwrap();
    conn
}

#[test]
fn declared_types_select_converters() {
    let conn = open();
    let row = conn
        .get_first_row("SELECT * FROM events WHERE id = 1", ())
        .unwrap()
        .unwrap();
    assert_eq!(row[0], Value::Integer(1));
    assert_eq!(row[1], Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
    assert_eq!(row[2], Value::Time(NaiveTime::from_hms_opt(13, 45, 0).unwrap()));
    assert_eq!(row[3], Value::Bool(true));
    assert_eq!(row[4], Value::Decimal("19.99".to_string()));
    assert_eq!(row[5], Value::Float(2.0));
    assert_eq!(row[6], Value::from("first"));
}

#[test]
fn malformed_values_pass_through_raw() {
    let conn = open();
    let row = conn
        .get_first_row("SELECT day, at, active, label FROM events WHERE id = 2", ())
        .unwrap()
        .unwrap();
    assert_eq!(row[0], Value::from("not a date"));
    assert!(row[1].is_null());
    assert_eq!(row[2], Value::Bool(false));
    assert!(row[3].is_null());
}

#[test]
fn expression_columns_are_untouched() {
    let conn = open();
    let row = conn
        .get_first_row("SELECT '2024-01-01' AS day, 1 AS active", ())
        .unwrap()
        .unwrap();
    assert_eq!(row[0], Value::from("2024-01-01"));
    assert_eq!(row[1], Value::Integer(1));
}

#[test]
fn translated_values_bind_back() {
    let conn = open();
    let day = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
    conn.execute(
        "INSERT INTO events (id, day, active) VALUES (3, ?, ?)",
        params![day, true],
    )
    .unwrap();
    let row = conn
        .get_first_row("SELECT day, active, typeof(day) FROM events WHERE id = 3", ())
        .unwrap()
        .unwrap();
    assert_eq!(row[0], Value::Date(day));
    assert_eq!(row[1], Value::Bool(true));
    assert_eq!(row[2], Value::from("text"));
}

#[test]
fn first_registered_converter_wins_and_overrides_keep_position() {
    let conn = open();
    conn.translator_mut(|t| {
        t.add("varchar", |_, v| v.as_str().map(|s| Value::from(s.to_uppercase())))
            .unwrap();
        t.add("varchar|text", |_, _| Some(Value::from("shadowed")))
            .unwrap();
    });
    let label = conn
        .get_first_value("SELECT label FROM events WHERE id = 1", ())
        .unwrap();
    assert_eq!(label, Some(Value::from("FIRST")));

    // Re-registering "date" replaces the default without moving it.
    conn.translator_mut(|t| {
        t.add("date", |_, v| v.as_str().map(|s| Value::from(format!("day:{s}"))))
            .unwrap();
    });
    assert_eq!(
        conn.get_first_value("SELECT day FROM events WHERE id = 1", ())
            .unwrap(),
        Some(Value::from("day:2024-02-29"))
    );

    conn.translator_mut(|t| {
        t.prepend("date|varchar", |_, _| Some(Value::Null)).unwrap();
    });
    assert_eq!(
        conn.get_first_value("SELECT day FROM events WHERE id = 1", ())
            .unwrap(),
        Some(Value::Null)
    );
}

#[test]
fn translation_can_be_toggled() {
    let conn = open();
    conn.set_type_translation(false);
    assert_eq!(
        conn.get_first_value("SELECT active FROM events WHERE id = 1", ())
            .unwrap(),
        Some(Value::from("t"))
    );
    conn.set_type_translation(true);
    assert_eq!(
        conn.get_first_value("SELECT active FROM events WHERE id = 1", ())
            .unwrap(),
        Some(Value::Bool(true))
    );
}
