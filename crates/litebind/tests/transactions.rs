use litebind::prelude::*;

fn count(conn: &Connection) -> i64 {
    conn.get_first_value("SELECT count(*) FROM ledger", ())
        .unwrap()
        .and_then(|v| v.as_i64())
        .unwrap()
}

fn setup(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE ledger (id INTEGER PRIMARY KEY, amount INTEGER NOT NULL CHECK (amount > 0));
         INSERT INTO ledger (amount) VALUES (10), (20);",
        (),
    )
    .unwrap();
}

#[test]
fn failing_block_restores_pre_transaction_state() {
    let conn = Connection::open_memory().unwrap();
    setup(&conn);
    assert_eq!(count(&conn), 2);

    let result = conn.transaction_with(TransactionMode::Deferred, |c| {
        c.execute("INSERT INTO ledger (amount) VALUES (30)", ())?;
        c.execute("DELETE FROM ledger WHERE amount = 10", ())?;
        c.execute("INSERT INTO ledger (amount) VALUES (-1)", ())?;
        Ok::<_, Error>(())
    });

    let err = result.unwrap_err();
    assert!(err.message().contains("CHECK constraint failed"));
    assert_eq!(count(&conn), 2);
    assert!(!conn.transaction_active());
}

#[test]
fn failing_block_propagates_caller_error_type() {
    #[derive(Debug)]
    enum AppError {
        Db(Error),
        Rejected(&'static str),
    }

    impl From<Error> for AppError {
        fn from(e: Error) -> Self {
            AppError::Db(e)
        }
    }

    let conn = Connection::open_memory().unwrap();
    setup(&conn);

    let result: std::result::Result<(), AppError> =
        conn.transaction_with(TransactionMode::Immediate, |c| {
            c.execute("INSERT INTO ledger (amount) VALUES (5)", ())?;
            Err(AppError::Rejected("limit exceeded"))
        });
    assert!(matches!(result, Err(AppError::Rejected("limit exceeded"))));
    assert_eq!(count(&conn), 2);

    let nested: std::result::Result<(), AppError> =
        conn.transaction_with(TransactionMode::Deferred, |c| {
            c.transaction(TransactionMode::Deferred)?;
            Ok(())
        });
    assert!(matches!(nested, Err(AppError::Db(Error::Step(_)))));
    assert!(!conn.transaction_active());
}

#[test]
fn successful_block_commits() {
    let conn = Connection::open_memory().unwrap();
    setup(&conn);
    let id = conn
        .transaction_with(TransactionMode::Exclusive, |c| {
            c.execute("INSERT INTO ledger (amount) VALUES (30)", ())?;
            c.last_insert_row_id()
        })
        .unwrap();
    assert_eq!(id, 3);
    assert_eq!(count(&conn), 3);
}

#[test]
fn panicking_block_rolls_back() {
    let conn = Connection::open_memory().unwrap();
    setup(&conn);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Result<()> = conn.transaction_with(TransactionMode::Deferred, |c| {
            c.execute("INSERT INTO ledger (amount) VALUES (30)", ())?;
            panic!("boom");
        });
    }));
    assert!(outcome.is_err());
    assert_eq!(count(&conn), 2);
    assert!(!conn.transaction_active());
}

#[test]
fn file_database_persists_committed_rows_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let path = path.to_str().unwrap();

    {
        let conn = Connection::open_file(path).unwrap();
        setup(&conn);

        let tx = conn.begin(TransactionMode::Immediate).unwrap();
        tx.execute("INSERT INTO ledger (amount) VALUES (30)", ())
            .unwrap();
        tx.commit().unwrap();

        conn.transaction(TransactionMode::Deferred).unwrap();
        conn.execute("INSERT INTO ledger (amount) VALUES (40)", ())
            .unwrap();
        // Closing with a transaction open discards it.
        conn.close().unwrap();
    }

    let conn = Connection::open_file(path).unwrap();
    assert_eq!(count(&conn), 3);
    assert!(!conn.transaction_active());
}

#[test]
fn busy_writer_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("busy.db");
    let path = path.to_str().unwrap();

    let first = Connection::open_file(path).unwrap();
    setup(&first);
    let second = Connection::open(&OpenOptions::file(path).busy_timeout(50)).unwrap();

    first.transaction(TransactionMode::Exclusive).unwrap();
    let err = second
        .execute("INSERT INTO ledger (amount) VALUES (1)", ())
        .unwrap_err();
    assert!(err.is_busy());
    first.rollback().unwrap();

    second
        .execute("INSERT INTO ledger (amount) VALUES (1)", ())
        .unwrap();
}
