//! Prometheus metrics for backfill runs.

use std::time::Duration;

use metrics::{counter, histogram};

use enrich_common::BackfillKind;

/// Where a unit of work ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Payload built and queued for writing
    Enqueued,
    SkippedExisting,
    SkippedNoDaylight,
    FetchFailed,
}

impl UnitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enqueued => "enqueued",
            Self::SkippedExisting => "skipped_existing",
            Self::SkippedNoDaylight => "skipped_no_daylight",
            Self::FetchFailed => "fetch_failed",
        }
    }
}

pub fn record_unit(kind: BackfillKind, outcome: UnitOutcome) {
    counter!(
        "backfill_units_total",
        "kind" => kind.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_fetch_error(kind: BackfillKind, class: &'static str) {
    counter!("backfill_fetch_errors_total", "kind" => kind.as_str(), "class" => class)
        .increment(1);
}

pub fn record_write_failures(kind: BackfillKind, failed: u64) {
    if failed > 0 {
        counter!("backfill_write_failures_total", "kind" => kind.as_str()).increment(failed);
    }
}

pub fn record_run(kind: BackfillKind, completed: bool, elapsed: Duration) {
    let completed = if completed { "true" } else { "false" };
    counter!("backfill_runs_total", "kind" => kind.as_str(), "completed" => completed)
        .increment(1);
    histogram!("backfill_run_duration_seconds", "kind" => kind.as_str())
        .record(elapsed.as_secs_f64());
}
