//! Indexed CRUD latency benchmark for PostgreSQL.
//!
//! For each requested record count the harness runs one trial:
//!
//! - **Schema**: drop and recreate `performance_test` with indexes on `age` and `name`
//! - **Insert**: batched multi-row insert of synthetic rows, then commit
//! - **Select**: point lookup by id, age range with `LIMIT 100`, name pattern match
//! - **Update**: single row by id, then bulk update by age
//! - **Delete**: single row by id, then bulk delete by age
//!
//! Each phase reports the combined wall-clock time of its statements.

pub mod config;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod report;
pub mod schema;

pub use config::{Args, BenchConfig, ConnectionConfig, OutputFormat, Progress};
pub use error::{Error, Phase, Result, Stage};
pub use fixtures::{generate_rows, BenchRow, RandomGenerator, RowGenerator};
pub use harness::{DeleteParams, Harness, SelectParams, UpdateParams};
pub use report::{BenchResults, TrialTimings};
pub use schema::StoredRow;
