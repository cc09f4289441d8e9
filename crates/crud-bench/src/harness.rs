//! Benchmark harness.
//!
//! Runs trials of schema reset, insert, select, update and delete against a
//! PostgreSQL server. Every phase opens its own connection and releases it
//! before returning, whether the phase succeeded or not. Statements run one at
//! a time on a current-thread runtime.

use std::time::{Duration, Instant};

use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use crate::config::{BenchConfig, Progress};
use crate::error::{Error, Phase, Result, Stage};
use crate::fixtures::{generate_rows, BenchRow, RandomGenerator, RowGenerator};
use crate::report::{phase_line, trial_header, BenchResults, TrialTimings};
use crate::schema::{self, StoredRow};

/// Rows per `INSERT` statement. Four bind parameters per row keeps each
/// statement under the server's 65535-parameter limit.
pub const INSERT_CHUNK_ROWS: usize = 10_000;

/// Row limit of the age range query.
pub const RANGE_QUERY_LIMIT: i64 = 100;

const INSERT_PREFIX: &str = "INSERT INTO performance_test (name, email, age, description) ";
const SELECT_BY_ID: &str = "SELECT * FROM performance_test WHERE id = $1";
const SELECT_BY_AGE: &str = "SELECT * FROM performance_test WHERE age > $1 LIMIT $2";
const SELECT_BY_NAME: &str = "SELECT * FROM performance_test WHERE name LIKE $1";
const UPDATE_AGE_BY_ID: &str = "UPDATE performance_test SET age = $1 WHERE id = $2";
const UPDATE_DESCRIPTION_BY_AGE: &str =
    "UPDATE performance_test SET description = $1 WHERE age > $2";
const DELETE_BY_ID: &str = "DELETE FROM performance_test WHERE id = $1";
const DELETE_BY_AGE: &str = "DELETE FROM performance_test WHERE age < $1";

/// Parameters of the select phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectParams {
    /// Id for the point lookup.
    pub id: i32,
    /// Lower (exclusive) age bound for the range query.
    pub min_age: i32,
    /// `LIKE` pattern for the name query.
    pub name_pattern: String,
}

/// Parameters of the update phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateParams {
    /// Id of the single-row update.
    pub id: i32,
    /// New age for that row.
    pub new_age: i32,
    /// Lower (exclusive) age bound for the bulk update.
    pub min_age: i32,
    /// New description for the bulk update.
    pub description: String,
}

/// Parameters of the delete phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteParams {
    /// Id of the single-row delete.
    pub id: i32,
    /// Upper (exclusive) age bound for the bulk delete.
    pub max_age: i32,
}

impl SelectParams {
    /// Draw parameters for a table of `records` rows.
    pub fn draw<G: RowGenerator + ?Sized>(generator: &mut G, records: usize) -> Self {
        Self {
            id: generator.int_in(1..=max_id(records)),
            min_age: generator.int_in(18..=50),
            name_pattern: format!("%{}%", generator.letter()),
        }
    }
}

impl UpdateParams {
    /// Draw parameters for a table of `records` rows.
    pub fn draw<G: RowGenerator + ?Sized>(generator: &mut G, records: usize) -> Self {
        Self {
            new_age: generator.int_in(18..=80),
            id: generator.int_in(1..=max_id(records)),
            description: generator.text(),
            min_age: generator.int_in(18..=50),
        }
    }
}

impl DeleteParams {
    /// Draw parameters for a table of `records` rows.
    pub fn draw<G: RowGenerator + ?Sized>(generator: &mut G, records: usize) -> Self {
        Self {
            id: generator.int_in(1..=max_id(records)),
            max_age: generator.int_in(18..=40),
        }
    }
}

/// Highest id a table of `records` rows can hold. An empty table still
/// yields 1, so the lookup simply matches nothing.
fn max_id(records: usize) -> i32 {
    i32::try_from(records).unwrap_or(i32::MAX).max(1)
}

/// Sequential CRUD benchmark against one PostgreSQL database.
pub struct Harness<G = RandomGenerator> {
    config: BenchConfig,
    generator: G,
    progress: Progress,
    rt: Runtime,
}

impl Harness<RandomGenerator> {
    /// Create a harness using the default generator, seeded from the config.
    pub fn new(config: BenchConfig) -> Result<Self> {
        let generator = match config.seed {
            Some(seed) => RandomGenerator::seeded(seed),
            None => RandomGenerator::new(),
        };
        Self::with_generator(config, generator)
    }
}

impl<G: RowGenerator> Harness<G> {
    /// Create a harness that draws all random values from `generator`.
    pub fn with_generator(config: BenchConfig, generator: G) -> Result<Self> {
        config.validate()?;
        let rt = Builder::new_current_thread().enable_all().build()?;

        Ok(Self {
            config,
            generator,
            progress: Progress::Stdout,
            rt,
        })
    }

    /// Choose where the per-phase progress lines go.
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    async fn connect(&self) -> Result<PgConnection> {
        let conn = &self.config.connection;
        debug!(host = %conn.host, port = conn.port, database = %conn.database, "Opening connection");
        PgConnection::connect_with(&conn.connect_options())
            .await
            .map_err(Error::Connection)
    }

    /// Query the server version string. Useful as a connectivity check.
    pub fn server_version(&self) -> Result<String> {
        self.rt.block_on(async {
            let mut conn = self.connect().await?;
            let result = sqlx::query_scalar("SELECT version()")
                .fetch_one(&mut conn)
                .await
                .map_err(Error::Read);
            release(conn).await;
            result
        })
    }

    /// Drop and recreate the benchmark table and its two indexes.
    ///
    /// Destroys any existing rows.
    pub fn prepare_schema(&self) -> Result<()> {
        self.rt.block_on(async {
            let mut conn = self.connect().await?;
            let result = schema::reset(&mut conn).await;
            release(conn).await;
            result
        })
    }

    /// Generate `count` rows from the harness generator.
    pub fn generate_rows(&mut self, count: usize) -> Vec<BenchRow> {
        generate_rows(&mut self.generator, count)
    }

    /// Insert `rows` in one transaction and return the time spent submitting
    /// and committing them.
    pub fn measure_insert(&self, rows: &[BenchRow]) -> Result<Duration> {
        self.rt.block_on(async {
            let mut conn = self.connect().await?;
            let result = insert_rows(&mut conn, rows).await;
            release(conn).await;
            result
        })
    }

    /// Run the point, range and pattern queries and return their combined time.
    pub fn measure_select(&mut self, records: usize) -> Result<Duration> {
        let params = SelectParams::draw(&mut self.generator, records);
        self.select_with(&params)
    }

    /// Run the select phase with explicit parameters.
    pub fn select_with(&self, params: &SelectParams) -> Result<Duration> {
        debug!(?params, "Select phase");
        self.rt.block_on(async {
            let mut conn = self.connect().await?;
            let result = select_queries(&mut conn, params).await;
            release(conn).await;
            result
        })
    }

    /// Run the single-row and bulk updates, commit, and return their combined time.
    pub fn measure_update(&mut self, records: usize) -> Result<Duration> {
        let params = UpdateParams::draw(&mut self.generator, records);
        self.update_with(&params)
    }

    /// Run the update phase with explicit parameters.
    pub fn update_with(&self, params: &UpdateParams) -> Result<Duration> {
        debug!(id = params.id, new_age = params.new_age, min_age = params.min_age, "Update phase");
        self.rt.block_on(async {
            let mut conn = self.connect().await?;
            let result = update_rows(&mut conn, params).await;
            release(conn).await;
            result
        })
    }

    /// Run the single-row and bulk deletes, commit, and return their combined time.
    pub fn measure_delete(&mut self, records: usize) -> Result<Duration> {
        let params = DeleteParams::draw(&mut self.generator, records);
        self.delete_with(params)
    }

    /// Run the delete phase with explicit parameters.
    pub fn delete_with(&self, params: DeleteParams) -> Result<Duration> {
        debug!(?params, "Delete phase");
        self.rt.block_on(async {
            let mut conn = self.connect().await?;
            let result = delete_rows(&mut conn, params).await;
            release(conn).await;
            result
        })
    }

    /// Number of rows currently in the table.
    pub fn row_count(&self) -> Result<i64> {
        self.rt.block_on(async {
            let mut conn = self.connect().await?;
            let result = schema::row_count(&mut conn).await;
            release(conn).await;
            result
        })
    }

    /// Read one row back by id.
    pub fn fetch_row(&self, id: i32) -> Result<Option<StoredRow>> {
        self.rt.block_on(async {
            let mut conn = self.connect().await?;
            let result = schema::fetch_row(&mut conn, id).await;
            release(conn).await;
            result
        })
    }

    /// Names of the indexes defined on the table.
    pub fn index_names(&self) -> Result<Vec<String>> {
        self.rt.block_on(async {
            let mut conn = self.connect().await?;
            let result = schema::index_names(&mut conn).await;
            release(conn).await;
            result
        })
    }

    /// Run one full trial: reset, insert `records` rows, then select, update
    /// and delete against them.
    ///
    /// Errors are wrapped in [`Error::Trial`] naming the record count and the
    /// step that failed.
    pub fn run_trial(&mut self, records: usize) -> Result<TrialTimings> {
        info!(records, "Starting trial");
        self.progress(|| format!("\n{}", trial_header(records)));

        self.prepare_schema()
            .map_err(Error::trial(records, Stage::Schema))?;

        let rows = self.generate_rows(records);
        let insert = self
            .measure_insert(&rows)
            .and_then(|elapsed| self.verify_count(records).map(|()| elapsed))
            .map_err(Error::trial(records, Phase::Insert))?;
        drop(rows);
        self.phase_done(Phase::Insert, insert);

        let select = self
            .measure_select(records)
            .map_err(Error::trial(records, Phase::Select))?;
        self.phase_done(Phase::Select, select);

        let update = self
            .measure_update(records)
            .map_err(Error::trial(records, Phase::Update))?;
        self.phase_done(Phase::Update, update);

        let delete = self
            .measure_delete(records)
            .map_err(Error::trial(records, Phase::Delete))?;
        self.phase_done(Phase::Delete, delete);

        Ok(TrialTimings {
            insert,
            select,
            update,
            delete,
        })
    }

    /// Run a trial for each configured record count, in order.
    ///
    /// Stops at the first failing trial.
    pub fn run_trials(&mut self) -> Result<BenchResults> {
        let counts = self.config.record_counts.clone();
        self.run_trials_for(&counts)
    }

    /// Run a trial for each of `record_counts`, in order.
    pub fn run_trials_for(&mut self, record_counts: &[usize]) -> Result<BenchResults> {
        let mut results = BenchResults::new();
        for &records in record_counts {
            let timings = self.run_trial(records)?;
            info!(records, total_ms = timings.total().as_millis() as u64, "Trial complete");
            results.record(records, timings);
        }
        Ok(results)
    }

    /// With verification enabled, check the table holds exactly `records` rows.
    fn verify_count(&self, records: usize) -> Result<()> {
        if !self.config.verify {
            return Ok(());
        }
        let actual = self.row_count()?;
        if actual != records as i64 {
            return Err(Error::Verification {
                expected: records,
                actual,
            });
        }
        debug!(rows = actual, "Row count verified");
        Ok(())
    }

    fn phase_done(&self, phase: Phase, elapsed: Duration) {
        info!(%phase, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "Phase complete");
        self.progress(|| phase_line(phase, elapsed));
    }

    fn progress(&self, line: impl FnOnce() -> String) {
        match self.progress {
            Progress::Stdout => println!("{}", line()),
            Progress::Stderr => eprintln!("{}", line()),
            Progress::Quiet => {}
        }
    }
}

/// Close a connection, logging instead of failing if the close itself errors.
async fn release(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close connection cleanly");
    }
}

async fn insert_rows(conn: &mut PgConnection, rows: &[BenchRow]) -> Result<Duration> {
    let start = Instant::now();
    let mut tx = conn.begin().await.map_err(Error::write(Phase::Insert))?;

    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(INSERT_PREFIX);
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(row.name.as_str())
                .push_bind(row.email.as_str())
                .push_bind(row.age)
                .push_bind(row.description.as_str());
        });
        builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(Error::write(Phase::Insert))?;
    }

    tx.commit().await.map_err(Error::write(Phase::Insert))?;
    Ok(start.elapsed())
}

async fn select_queries(conn: &mut PgConnection, params: &SelectParams) -> Result<Duration> {
    let start = Instant::now();

    sqlx::query(SELECT_BY_ID)
        .bind(params.id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(Error::Read)?;

    sqlx::query(SELECT_BY_AGE)
        .bind(params.min_age)
        .bind(RANGE_QUERY_LIMIT)
        .fetch_all(&mut *conn)
        .await
        .map_err(Error::Read)?;

    sqlx::query(SELECT_BY_NAME)
        .bind(params.name_pattern.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(Error::Read)?;

    Ok(start.elapsed())
}

async fn update_rows(conn: &mut PgConnection, params: &UpdateParams) -> Result<Duration> {
    let start = Instant::now();
    let mut tx = conn.begin().await.map_err(Error::write(Phase::Update))?;

    sqlx::query(UPDATE_AGE_BY_ID)
        .bind(params.new_age)
        .bind(params.id)
        .execute(&mut *tx)
        .await
        .map_err(Error::write(Phase::Update))?;

    sqlx::query(UPDATE_DESCRIPTION_BY_AGE)
        .bind(params.description.as_str())
        .bind(params.min_age)
        .execute(&mut *tx)
        .await
        .map_err(Error::write(Phase::Update))?;

    tx.commit().await.map_err(Error::write(Phase::Update))?;
    Ok(start.elapsed())
}

async fn delete_rows(conn: &mut PgConnection, params: DeleteParams) -> Result<Duration> {
    let start = Instant::now();
    let mut tx = conn.begin().await.map_err(Error::write(Phase::Delete))?;

    sqlx::query(DELETE_BY_ID)
        .bind(params.id)
        .execute(&mut *tx)
        .await
        .map_err(Error::write(Phase::Delete))?;

    sqlx::query(DELETE_BY_AGE)
        .bind(params.max_age)
        .execute(&mut *tx)
        .await
        .map_err(Error::write(Phase::Delete))?;

    tx.commit().await.map_err(Error::write(Phase::Delete))?;
    Ok(start.elapsed())
}
