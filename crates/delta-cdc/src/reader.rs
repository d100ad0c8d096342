//! Drives a record source through a [`ChangeEventConsumer`]
//!
//! The consumer blocks on emission, so the loop runs on the blocking pool.

use crate::{ChangeEventConsumer, RawChangeRecord, RecordOutcome};
use delta_core::{DeltaError, EventEmitter, Result};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

/// Counters for one reader run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderReport {
    pub records: usize,
    pub ddl_events: usize,
    pub dml_events: usize,
    pub skipped: usize,
    /// The run ended on a stop request instead of source exhaustion
    pub stopped: bool,
}

pub struct EventReader {
    handle: JoinHandle<Result<ReaderReport>>,
}

impl EventReader {
    /// Start consuming `source` on the blocking pool
    pub fn start<I, E>(source: I, consumer: ChangeEventConsumer<E>) -> Self
    where
        I: IntoIterator<Item = Result<RawChangeRecord>> + Send + 'static,
        I::IntoIter: Send,
        E: EventEmitter + 'static,
    {
        let handle = tokio::task::spawn_blocking(move || run(source, consumer));
        Self { handle }
    }

    /// Wait for the run to end
    pub async fn join(self) -> Result<ReaderReport> {
        self.handle
            .await
            .map_err(|e| DeltaError::InternalError(format!("reader task failed: {}", e)))?
    }
}

/// Feed every record to the consumer until the source ends, a stop is
/// requested or a fatal error occurs.
#[instrument(level = "info", skip_all)]
pub fn run<I, E>(source: I, mut consumer: ChangeEventConsumer<E>) -> Result<ReaderReport>
where
    I: IntoIterator<Item = Result<RawChangeRecord>>,
    E: EventEmitter,
{
    let mut report = ReaderReport::default();

    for record in source {
        report.records += 1;

        match consumer.accept(record?) {
            Ok(RecordOutcome::Processed {
                ddl_events,
                dml_events,
            }) => {
                report.ddl_events += ddl_events;
                report.dml_events += dml_events;
            }
            Ok(RecordOutcome::Skipped(_)) => report.skipped += 1,
            Ok(RecordOutcome::StopRequested) => {
                info!(records = report.records, "Stop requested, halting reader");
                report.stopped = true;
                break;
            }
            Err(e) => {
                error!(error = %e, records = report.records, "Reader failed");
                return Err(e);
            }
        }
    }

    info!(
        records = report.records,
        ddl_events = report.ddl_events,
        dml_events = report.dml_events,
        skipped = report.skipped,
        stopped = report.stopped,
        "Reader finished"
    );
    Ok(report)
}
