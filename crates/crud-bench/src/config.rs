//! Benchmark configuration.

use clap::{Parser, ValueEnum};
use sqlx::postgres::PgConnectOptions;

use crate::error::{Error, Result};

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default server port.
pub const DEFAULT_PORT: u16 = 5432;

/// Default database name.
pub const DEFAULT_DATABASE: &str = "defaultdb";

/// Default user name.
pub const DEFAULT_USER: &str = "postgres";

/// Application name reported to the server.
pub const DEFAULT_APPLICATION_NAME: &str = "crud-bench";

/// Record counts tested when none are given.
pub const DEFAULT_RECORD_COUNTS: [usize; 4] = [1_000, 10_000, 100_000, 1_000_000];

/// Largest record count a trial accepts. Ids are `SERIAL` (int4).
pub const MAX_RECORD_COUNT: usize = i32::MAX as usize;

/// Output format for the final report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table.
    #[default]
    Table,
    /// JSON array, one object per trial.
    Json,
}

/// Destination of the per-phase progress lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Progress {
    #[default]
    Stdout,
    /// Used when stdout carries machine-readable output.
    Stderr,
    Quiet,
}

impl From<OutputFormat> for Progress {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => Progress::Stdout,
            OutputFormat::Json => Progress::Stderr,
        }
    }
}

/// Indexed CRUD latency benchmark for PostgreSQL.
#[derive(Debug, Parser)]
#[command(name = "crud-bench")]
#[command(version, about = "Time insert/select/update/delete against an indexed PostgreSQL table")]
pub struct Args {
    /// Server host.
    #[arg(short = 'H', long, env = "PGHOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Server port.
    #[arg(short, long, env = "PGPORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Database name.
    #[arg(short, long, env = "PGDATABASE", default_value = DEFAULT_DATABASE)]
    pub dbname: String,

    /// User name.
    #[arg(short = 'U', long, env = "PGUSER", default_value = DEFAULT_USER)]
    pub user: String,

    /// Password.
    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Extra server startup option, as key=value. May be repeated.
    #[arg(long = "option", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,

    /// Record counts to test, in order.
    #[arg(
        short = 'n',
        long = "records",
        value_delimiter = ',',
        default_values_t = DEFAULT_RECORD_COUNTS
    )]
    pub records: Vec<usize>,

    /// Seed for the data generator. Random when unset.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Check the row count after each insert phase.
    #[arg(long)]
    pub verify: bool,

    /// Output format for the final report.
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got `{s}`")),
    }
}

/// Connection parameters. Used to open a fresh connection for every phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// User name.
    pub user: String,
    /// Password, if the server requires one.
    pub password: Option<String>,
    /// Application name reported to the server.
    pub application_name: String,
    /// Extra startup parameters passed through to the server.
    pub options: Vec<(String, String)>,
}

impl ConnectionConfig {
    /// Create a configuration for `database` on `host:port`.
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: DEFAULT_USER.to_string(),
            password: None,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            options: Vec::new(),
        }
    }

    /// Set the user name.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the application name.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Add a server startup option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /// Check that the parameters can be used to connect.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(Error::Config("database name must not be empty".into()));
        }
        if self.user.trim().is_empty() {
            return Err(Error::Config("user must not be empty".into()));
        }
        Ok(())
    }

    /// Build driver connect options.
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .application_name(&self.application_name);
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        if !self.options.is_empty() {
            opts = opts.options(self.options.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        opts
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT, DEFAULT_DATABASE)
    }
}

/// Full benchmark configuration handed to the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Where to connect.
    pub connection: ConnectionConfig,
    /// Record counts, one trial each, in order.
    pub record_counts: Vec<usize>,
    /// Generator seed; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Count rows after the insert phase.
    pub verify: bool,
}

impl BenchConfig {
    /// Create a configuration with the default record counts.
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            record_counts: DEFAULT_RECORD_COUNTS.to_vec(),
            seed: None,
            verify: false,
        }
    }

    /// Set the record counts.
    pub fn with_record_counts(mut self, counts: impl IntoIterator<Item = usize>) -> Self {
        self.record_counts = counts.into_iter().collect();
        self
    }

    /// Set the generator seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable row-count verification after inserts.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Check connection parameters and record counts.
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        if self.record_counts.is_empty() {
            return Err(Error::Config("at least one record count is required".into()));
        }
        if let Some(count) = self.record_counts.iter().find(|&&c| c > MAX_RECORD_COUNT) {
            return Err(Error::Config(format!(
                "record count {count} exceeds the maximum of {MAX_RECORD_COUNT}"
            )));
        }
        Ok(())
    }
}

impl From<&Args> for BenchConfig {
    fn from(args: &Args) -> Self {
        let connection = ConnectionConfig {
            host: args.host.clone(),
            port: args.port,
            database: args.dbname.clone(),
            user: args.user.clone(),
            password: args.password.clone(),
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            options: args.options.clone(),
        };

        Self {
            connection,
            record_counts: args.records.clone(),
            seed: args.seed,
            verify: args.verify,
        }
    }
}
