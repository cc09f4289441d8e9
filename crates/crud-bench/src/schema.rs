//! Benchmark table definition and inspection queries.

use sqlx::{Connection, PgConnection, Row};

use crate::error::{Error, Result};
use crate::fixtures::BenchRow;

/// Name of the benchmark table.
pub const TABLE_NAME: &str = "performance_test";

/// Secondary index on `age`.
pub const AGE_INDEX: &str = "idx_performance_test_age";

/// Secondary index on `name`.
pub const NAME_INDEX: &str = "idx_performance_test_name";

/// Statements run, in order, to reset the table.
pub const SCHEMA_STATEMENTS: [&str; 4] = [
    "DROP TABLE IF EXISTS performance_test",
    r#"
    CREATE TABLE performance_test (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100),
        email VARCHAR(100),
        age INT,
        description TEXT
    )
    "#,
    "CREATE INDEX idx_performance_test_age ON performance_test (age)",
    "CREATE INDEX idx_performance_test_name ON performance_test (name)",
];

/// A row read back from the table, with its assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: i32,
    pub row: BenchRow,
}

/// Drop and recreate the table and its indexes in one transaction.
///
/// Any rejected statement rolls the whole reset back.
pub async fn reset(conn: &mut PgConnection) -> Result<()> {
    let mut tx = conn.begin().await.map_err(Error::Schema)?;
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(Error::Schema)?;
    }
    tx.commit().await.map_err(Error::Schema)
}

/// Number of rows currently in the table.
pub async fn row_count(conn: &mut PgConnection) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM performance_test")
        .fetch_one(conn)
        .await
        .map_err(Error::Read)
}

/// Fetch a single row by id.
pub async fn fetch_row(conn: &mut PgConnection, id: i32) -> Result<Option<StoredRow>> {
    let row = sqlx::query(
        "SELECT id, name, email, age, description FROM performance_test WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(Error::Read)?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(StoredRow {
        id: row.try_get("id").map_err(Error::Read)?,
        row: BenchRow {
            name: row.try_get("name").map_err(Error::Read)?,
            email: row.try_get("email").map_err(Error::Read)?,
            age: row.try_get("age").map_err(Error::Read)?,
            description: row.try_get("description").map_err(Error::Read)?,
        },
    }))
}

/// Names of all indexes defined on the table, sorted.
pub async fn index_names(conn: &mut PgConnection) -> Result<Vec<String>> {
    sqlx::query_scalar(
        "SELECT indexname::text FROM pg_indexes \
         WHERE schemaname = current_schema() AND tablename = $1 \
         ORDER BY indexname",
    )
    .bind(TABLE_NAME)
    .fetch_all(conn)
    .await
    .map_err(Error::Read)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_reference_table() {
        for statement in SCHEMA_STATEMENTS {
            assert!(statement.contains(TABLE_NAME), "{statement}");
        }
    }

    #[test]
    fn test_drop_runs_first() {
        assert!(SCHEMA_STATEMENTS[0].starts_with("DROP TABLE IF EXISTS"));
        assert!(SCHEMA_STATEMENTS[1].contains("id SERIAL PRIMARY KEY"));
    }

    #[test]
    fn test_both_indexes_created() {
        assert!(SCHEMA_STATEMENTS
            .iter()
            .any(|s| s.contains(AGE_INDEX) && s.contains("(age)")));
        assert!(SCHEMA_STATEMENTS
            .iter()
            .any(|s| s.contains(NAME_INDEX) && s.contains("(name)")));
    }
}
