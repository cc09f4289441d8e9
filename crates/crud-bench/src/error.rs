//! Error types for the benchmark harness.

use std::fmt;

use thiserror::Error;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A timed operation category within a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Insert,
    Select,
    Update,
    Delete,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 4] = [Phase::Insert, Phase::Select, Phase::Update, Phase::Delete];

    /// Lowercase phase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Insert => "insert",
            Phase::Select => "select",
            Phase::Update => "update",
            Phase::Delete => "delete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step of a trial: the schema reset or one of the timed phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Schema,
    Phase(Phase),
}

impl Stage {
    /// The timed phase, if this stage is one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Stage::Schema => None,
            Stage::Phase(phase) => Some(*phase),
        }
    }
}

impl From<Phase> for Stage {
    fn from(phase: Phase) -> Self {
        Stage::Phase(phase)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Schema => f.write_str("schema preparation"),
            Stage::Phase(phase) => write!(f, "{phase} phase"),
        }
    }
}

/// Errors that can occur while running the benchmark.
#[derive(Debug, Error)]
pub enum Error {
    /// Could not establish or keep a session with the server.
    #[error("connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// DDL was rejected while preparing the schema.
    #[error("schema error: {0}")]
    Schema(#[source] sqlx::Error),

    /// An insert, update or delete statement (or its commit) was rejected.
    #[error("write error during {phase} phase: {source}")]
    Write {
        /// Phase that issued the statement.
        phase: Phase,
        #[source]
        source: sqlx::Error,
    },

    /// A select statement was rejected.
    #[error("read error: {0}")]
    Read(#[source] sqlx::Error),

    /// Row count after insert did not match the requested count.
    #[error("verification failed: expected {expected} rows, found {actual}")]
    Verification {
        /// Number of rows submitted.
        expected: usize,
        /// Number of rows found in the table.
        actual: i64,
    },

    /// Invalid configuration input.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The async runtime could not be built.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// A trial failed; wraps the underlying error with the record count
    /// and the step that was running.
    #[error("trial with {records} records failed during {stage}: {source}")]
    Trial {
        /// Record count of the failed trial.
        records: usize,
        /// Step that failed.
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn write(phase: Phase) -> impl FnOnce(sqlx::Error) -> Error {
        move |source| Error::Write { phase, source }
    }

    pub(crate) fn trial(records: usize, stage: impl Into<Stage>) -> impl FnOnce(Error) -> Error {
        let stage = stage.into();
        move |source| Error::Trial {
            records,
            stage,
            source: Box::new(source),
        }
    }

    /// Step of the trial that failed, if this is a trial error.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Trial { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Phase that failed, if the error is tied to one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::Write { phase, .. } => Some(*phase),
            Error::Read(_) => Some(Phase::Select),
            Error::Verification { .. } => Some(Phase::Insert),
            Error::Trial { stage, source, .. } => stage.phase().or_else(|| source.phase()),
            _ => None,
        }
    }

    /// Returns true for connection failures, including ones wrapped in a trial.
    pub fn is_connection(&self) -> bool {
        match self {
            Error::Connection(_) => true,
            Error::Trial { source, .. } => source.is_connection(),
            _ => false,
        }
    }
}
