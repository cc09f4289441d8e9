//! Integration tests against a live PostgreSQL server.
//!
//! Set `CRUD_BENCH_HOST` (and optionally `CRUD_BENCH_PORT`, `CRUD_BENCH_DB`,
//! `CRUD_BENCH_USER`, `CRUD_BENCH_PASSWORD`) to run them. Without a host they
//! print a notice and return.
//!
//! Example: CRUD_BENCH_HOST=localhost CRUD_BENCH_DB=postgres cargo test -p crud-bench

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crud_bench::schema::{AGE_INDEX, NAME_INDEX};
use crud_bench::{
    BenchConfig, ConnectionConfig, DeleteParams, Error, Harness, Progress, RandomGenerator,
    SelectParams, UpdateParams,
};
use sqlx::{Connection, PgConnection, Row};

/// All tests share one table.
static DB_LOCK: Mutex<()> = Mutex::new(());

fn lock() -> MutexGuard<'static, ()> {
    DB_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn connection_from_env() -> Option<ConnectionConfig> {
    let host = std::env::var("CRUD_BENCH_HOST").ok()?;
    let port = std::env::var("CRUD_BENCH_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5432);
    let db = std::env::var("CRUD_BENCH_DB").unwrap_or_else(|_| "postgres".to_string());
    let mut config = ConnectionConfig::new(host, port, db);
    if let Ok(user) = std::env::var("CRUD_BENCH_USER") {
        config = config.with_user(user);
    }
    if let Ok(password) = std::env::var("CRUD_BENCH_PASSWORD") {
        config = config.with_password(password);
    }
    Some(config)
}

fn harness(seed: u64) -> Option<Harness> {
    let Some(connection) = connection_from_env() else {
        println!("Skipping: CRUD_BENCH_HOST not set");
        return None;
    };
    let config = BenchConfig::new(connection).with_seed(seed);
    Some(Harness::new(config).unwrap().with_progress(Progress::Quiet))
}

/// Run `query` on a side connection and return every `age` it yields.
fn ages(connection: &ConnectionConfig, query: &str, arg: i32) -> Vec<i32> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async {
        let mut conn = PgConnection::connect_with(&connection.connect_options())
            .await
            .unwrap();
        let rows = sqlx::query(query).bind(arg).fetch_all(&mut conn).await.unwrap();
        conn.close().await.unwrap();
        rows.iter().map(|r| r.get::<i32, _>("age")).collect()
    })
}

/// Descriptions of every row older than `min_age`, read on a side connection.
fn descriptions_older_than(connection: &ConnectionConfig, min_age: i32) -> Vec<String> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async {
        let mut conn = PgConnection::connect_with(&connection.connect_options())
            .await
            .unwrap();
        let rows = sqlx::query_scalar("SELECT description FROM performance_test WHERE age > $1")
            .bind(min_age)
            .fetch_all(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();
        rows
    })
}

#[test]
fn test_insert_row_count_matches() {
    let _guard = lock();
    let Some(mut harness) = harness(1) else { return };

    harness.prepare_schema().unwrap();
    let rows = harness.generate_rows(500);
    harness.measure_insert(&rows).unwrap();

    assert_eq!(harness.row_count().unwrap(), 500);
}

#[test]
fn test_insert_spans_multiple_statements() {
    let _guard = lock();
    let Some(mut harness) = harness(2) else { return };

    harness.prepare_schema().unwrap();
    let count = crud_bench::harness::INSERT_CHUNK_ROWS + 17;
    let rows = harness.generate_rows(count);
    harness.measure_insert(&rows).unwrap();

    assert_eq!(harness.row_count().unwrap(), count as i64);
}

#[test]
fn test_round_trip_by_id() {
    let _guard = lock();
    let Some(mut harness) = harness(3) else { return };

    harness.prepare_schema().unwrap();
    let rows = harness.generate_rows(20);
    harness.measure_insert(&rows).unwrap();

    let first = harness.fetch_row(1).unwrap().expect("row 1 exists");
    assert_eq!(first.id, 1);
    assert_eq!(first.row, rows[0]);

    let last = harness.fetch_row(20).unwrap().expect("row 20 exists");
    assert_eq!(last.row, rows[19]);

    assert!(harness.fetch_row(21).unwrap().is_none());
}

#[test]
fn test_prepare_schema_is_idempotent() {
    let _guard = lock();
    let Some(mut harness) = harness(4) else { return };

    harness.prepare_schema().unwrap();
    let rows = harness.generate_rows(50);
    harness.measure_insert(&rows).unwrap();

    harness.prepare_schema().unwrap();
    harness.prepare_schema().unwrap();

    assert_eq!(harness.row_count().unwrap(), 0);
    let indexes = harness.index_names().unwrap();
    assert_eq!(
        indexes,
        vec![
            AGE_INDEX.to_string(),
            NAME_INDEX.to_string(),
            "performance_test_pkey".to_string(),
        ]
    );
}

#[test]
fn test_zero_rows_insert() {
    let _guard = lock();
    let Some(harness) = harness(5) else { return };

    harness.prepare_schema().unwrap();
    let elapsed = harness.measure_insert(&[]).unwrap();

    assert!(elapsed < Duration::from_secs(1), "{elapsed:?}");
    assert_eq!(harness.row_count().unwrap(), 0);
}

#[test]
fn test_thousand_record_scenario() {
    let _guard = lock();
    let Some(mut harness) = harness(6) else { return };
    let connection = harness.config().connection.clone();

    harness.prepare_schema().unwrap();
    let rows = harness.generate_rows(1000);
    harness.measure_insert(&rows).unwrap();

    for id in [1, 500, 1000] {
        assert!(harness.fetch_row(id).unwrap().is_some(), "id {id}");
    }

    let range = ages(
        &connection,
        "SELECT * FROM performance_test WHERE age > $1 LIMIT 100",
        18,
    );
    assert!(range.len() <= 100);
    assert!(range.iter().all(|&age| age > 18));

    let params = SelectParams {
        id: 1,
        min_age: 18,
        name_pattern: "%A%".to_string(),
    };
    harness.select_with(&params).unwrap();

    harness
        .delete_with(DeleteParams { id: 1, max_age: 40 })
        .unwrap();
    let remaining = ages(
        &connection,
        "SELECT age FROM performance_test WHERE age < $1",
        40,
    );
    assert!(remaining.is_empty(), "{remaining:?}");
    assert!(harness.fetch_row(1).unwrap().is_none());
}

#[test]
fn test_update_phase_changes_rows() {
    let _guard = lock();
    let Some(mut harness) = harness(9) else { return };
    let connection = harness.config().connection.clone();

    harness.prepare_schema().unwrap();
    let rows = harness.generate_rows(1000);
    harness.measure_insert(&rows).unwrap();

    let params = UpdateParams {
        id: 1,
        new_age: 80,
        min_age: 50,
        description: "updated description".to_string(),
    };
    harness.update_with(&params).unwrap();

    let first = harness.fetch_row(1).unwrap().unwrap();
    assert_eq!(first.row.age, 80);
    assert_eq!(first.row.description, "updated description");

    let older = descriptions_older_than(&connection, 50);
    let expected = rows.iter().skip(1).filter(|r| r.age > 50).count() + 1;
    assert_eq!(older.len(), expected);
    assert!(older.iter().all(|d| d == "updated description"), "{older:?}");
}

#[test]
fn test_run_trials_collects_every_count() {
    let _guard = lock();
    let Some(connection) = connection_from_env() else {
        println!("Skipping: CRUD_BENCH_HOST not set");
        return;
    };
    let config = BenchConfig::new(connection)
        .with_record_counts([10, 100, 10])
        .with_verify(true);
    let mut harness = Harness::with_generator(config, RandomGenerator::seeded(7))
        .unwrap()
        .with_progress(Progress::Quiet);

    let results = harness.run_trials().unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.get(10).is_some());
    assert!(results.get(100).is_some());
}

#[test]
fn test_unreachable_host_leaves_schema_untouched() {
    let _guard = lock();
    let Some(mut harness) = harness(8) else { return };

    harness.prepare_schema().unwrap();
    let rows = harness.generate_rows(30);
    harness.measure_insert(&rows).unwrap();

    let bad = BenchConfig::new(ConnectionConfig::new("127.0.0.1", 1, "nowhere"));
    let err = Harness::new(bad)
        .unwrap()
        .with_progress(Progress::Quiet)
        .prepare_schema()
        .unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "{err}");

    assert_eq!(harness.row_count().unwrap(), 30);
}
