//! Timing results and their rendering.

use std::collections::BTreeMap;
use std::time::Duration;

use comfy_table::{Cell, CellAlignment, Table};
use serde::Serialize;

use crate::config::OutputFormat;
use crate::error::Phase;

/// Durations of the four phases of one trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrialTimings {
    pub insert: Duration,
    pub select: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl TrialTimings {
    /// Duration recorded for `phase`.
    pub fn get(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Insert => self.insert,
            Phase::Select => self.select,
            Phase::Update => self.update,
            Phase::Delete => self.delete,
        }
    }

    /// Sum of all four phases.
    pub fn total(&self) -> Duration {
        self.insert + self.select + self.update + self.delete
    }
}

/// Serialized form of one trial.
#[derive(Debug, Serialize)]
struct TrialRecord {
    records: usize,
    insert_secs: f64,
    select_secs: f64,
    update_secs: f64,
    delete_secs: f64,
}

/// Timings of every trial, keyed by record count.
///
/// A repeated record count replaces the earlier entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchResults {
    trials: BTreeMap<usize, TrialTimings>,
}

impl BenchResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the timings for a trial.
    pub fn record(&mut self, records: usize, timings: TrialTimings) {
        self.trials.insert(records, timings);
    }

    /// Timings for `records`, if that trial ran.
    pub fn get(&self, records: usize) -> Option<&TrialTimings> {
        self.trials.get(&records)
    }

    /// Trials in ascending record-count order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &TrialTimings)> {
        self.trials.iter().map(|(records, timings)| (*records, timings))
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Render the results in the requested format.
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => self.to_table(),
            OutputFormat::Json => self.to_json(),
        }
    }

    /// Summary table, one row per trial.
    pub fn to_table(&self) -> String {
        let mut table = Table::new();
        let mut headers = vec![Cell::new("Records")];
        headers.extend(
            Phase::ALL
                .iter()
                .map(|phase| Cell::new(format!("{} (s)", phase_label(*phase)))),
        );
        table.set_header(headers);

        for (records, timings) in self.iter() {
            let mut cells = vec![Cell::new(records).set_alignment(CellAlignment::Right)];
            cells.extend(Phase::ALL.iter().map(|phase| {
                Cell::new(format!("{:.4}", timings.get(*phase).as_secs_f64()))
                    .set_alignment(CellAlignment::Right)
            }));
            table.add_row(cells);
        }

        table.to_string()
    }

    /// JSON array, one object per trial.
    pub fn to_json(&self) -> String {
        let records: Vec<TrialRecord> = self
            .iter()
            .map(|(records, t)| TrialRecord {
                records,
                insert_secs: t.insert.as_secs_f64(),
                select_secs: t.select.as_secs_f64(),
                update_secs: t.update.as_secs_f64(),
                delete_secs: t.delete.as_secs_f64(),
            })
            .collect();
        serde_json::to_string_pretty(&records).unwrap_or_else(|_| "[]".to_string())
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Insert => "Insert",
        Phase::Select => "Select",
        Phase::Update => "Update",
        Phase::Delete => "Delete",
    }
}

/// Progress line printed after a phase completes, e.g. `Insert Time: 0.1234 seconds`.
pub fn phase_line(phase: Phase, elapsed: Duration) -> String {
    format!("{} Time: {:.4} seconds", phase_label(phase), elapsed.as_secs_f64())
}

/// Header printed before a trial starts.
pub fn trial_header(records: usize) -> String {
    format!("Testing with {records} records (WITH INDEXES):")
}
