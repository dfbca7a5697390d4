//! Batched, best-effort enrichment writes.

use tracing::{debug, warn};

use crate::store::{DocumentStore, EnrichmentWrite};

/// Totals across every flush of one writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: u64,
    pub failed: u64,
}

impl FlushReport {
    fn add(&mut self, other: FlushReport) {
        self.written += other.written;
        self.failed += other.failed;
    }
}

/// Accumulates writes and flushes them as unordered bulk writes.
///
/// A batch is flushed when it reaches `batch_size` and once more on
/// `finish`. Failures are logged and counted, never raised.
pub struct BatchWriter<'a> {
    store: &'a dyn DocumentStore,
    batch_size: usize,
    pending: Vec<EnrichmentWrite>,
    totals: FlushReport,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a dyn DocumentStore, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            totals: FlushReport::default(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Queue a write, flushing if the batch is full.
    ///
    /// Returns the report of the flush this call triggered, if any.
    pub async fn enqueue(&mut self, write: EnrichmentWrite) -> Option<FlushReport> {
        self.pending.push(write);
        if self.pending.len() >= self.batch_size {
            return Some(self.flush().await);
        }
        None
    }

    /// Send everything queued so far.
    ///
    /// A bulk write that fails outright counts the whole batch as failed;
    /// those keys are revisited by the next run.
    pub async fn flush(&mut self) -> FlushReport {
        if self.pending.is_empty() {
            return FlushReport::default();
        }

        let batch = std::mem::take(&mut self.pending);
        let batch_len = batch.len();

        let report = match self.store.bulk_write(batch).await {
            Ok(result) => {
                for failure in &result.failed {
                    warn!(
                        key = %failure.key,
                        error = %failure.error,
                        batch_size = batch_len,
                        "Enrichment write failed"
                    );
                }
                FlushReport {
                    written: result.written as u64,
                    failed: result.failed.len() as u64,
                }
            }
            Err(e) => {
                warn!(error = %e, batch_size = batch_len, "Bulk write failed");
                FlushReport {
                    written: 0,
                    failed: batch_len as u64,
                }
            }
        };

        debug!(
            written = report.written,
            failed = report.failed,
            "Flushed enrichment batch"
        );
        self.totals.add(report);
        report
    }

    /// Flush the remainder and return totals for the writer's lifetime.
    pub async fn finish(mut self) -> FlushReport {
        self.flush().await;
        self.totals
    }
}
