//! Change event consumer
//!
//! Translates raw connector records into DDL and DML events, one record at a
//! time. For each row change the consumer:
//!
//! 1. reports the source as reachable,
//! 2. drops records without a value,
//! 3. drops streaming records at or before the latest acknowledged offset,
//! 4. classifies the operation code,
//! 5. decodes `server.schema.table` from the topic,
//! 6. drops tables outside a non-empty registry,
//! 7. fails on keyless tables,
//! 8. selects and projects the before/after rows,
//! 9. on first sighting of a table emits `DROP_TABLE` (when replicating
//!    existing data), `CREATE_DATABASE` and `CREATE_TABLE`,
//! 10. drops blacklisted operations,
//! 11. emits the DML event.
//!
//! An interrupted emission turns into [`RecordOutcome::StopRequested`]; the
//! consumer refuses every record after that.

use crate::{
    table_from_topic, ChangeValue, Operation, RawChangeRecord, RowChange, SchemaChange, SourceOffset,
};
use delta_core::{
    ChangeEvent, DdlEvent, DdlGate, DdlOperation, DeltaError, DmlEvent, EmitError, EventEmitter,
    Offset, Result, SourceContext, TableInterest, TableRegistry,
};
use delta_shared::{EventMetrics, PerfTimer, SourceConfig};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Why a record produced no events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoValue,
    Duplicate,
    UnknownOperation,
    MalformedTopic,
    TableNotSelected,
    NoRow,
    Blacklisted,
    IgnoredSchemaChange,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoValue => "no_value",
            SkipReason::Duplicate => "duplicate",
            SkipReason::UnknownOperation => "unknown_operation",
            SkipReason::MalformedTopic => "malformed_topic",
            SkipReason::TableNotSelected => "table_not_selected",
            SkipReason::NoRow => "no_row",
            SkipReason::Blacklisted => "blacklisted",
            SkipReason::IgnoredSchemaChange => "ignored_schema_change",
        }
    }
}

/// Result of handing one record to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Processed { ddl_events: usize, dml_events: usize },
    Skipped(SkipReason),
    /// The emitter was interrupted; the connector must halt right away
    StopRequested,
}

pub struct ChangeEventConsumer<E> {
    database: String,
    registry: TableRegistry,
    replicate_existing_data: bool,
    latest_offset: Option<SourceOffset>,
    gate: DdlGate,
    emitter: E,
    context: Arc<dyn SourceContext>,
    stopped: bool,
}

impl<E: EventEmitter> ChangeEventConsumer<E> {
    /// Build a consumer for one run.
    ///
    /// `latest_offset` is the latest offset acknowledged downstream; an empty
    /// offset means a cold start.
    pub fn new(
        config: &SourceConfig,
        emitter: E,
        context: Arc<dyn SourceContext>,
        latest_offset: &Offset,
    ) -> Result<Self> {
        let latest_offset = SourceOffset::from_offset(latest_offset)?;

        let gate = match (&latest_offset, config.restore_ddl_state) {
            (Some(offset), true) => DdlGate::seeded(offset.ddl_sent().iter().cloned()),
            _ => DdlGate::new(),
        };

        info!(
            database = %config.database,
            tables = config.tables.len(),
            replicate_existing_data = config.replicate_existing_data,
            latest_offset = ?latest_offset.as_ref().map(|o| o.position().to_string()),
            restored_ddl_tables = gate.len(),
            "Created change event consumer"
        );

        Ok(Self {
            database: config.database.clone(),
            registry: config.table_registry(),
            replicate_existing_data: config.replicate_existing_data,
            latest_offset,
            gate,
            emitter,
            context,
            stopped: false,
        })
    }

    pub fn gate(&self) -> &DdlGate {
        &self.gate
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Process one record to completion.
    ///
    /// Returns `Err` only for fatal errors; the consumer is stopped afterwards.
    #[instrument(level = "debug", skip_all, fields(topic = ?record.topic, position = %record.offset.position))]
    pub fn accept(&mut self, record: RawChangeRecord) -> Result<RecordOutcome> {
        if self.stopped {
            return Ok(RecordOutcome::StopRequested);
        }
        EventMetrics::record_received();

        if let Err(e) = self.context.set_ok() {
            warn!(error = %e, "Unable to set source state to OK");
        }

        let outcome = self.process(record);
        match &outcome {
            Ok(RecordOutcome::Skipped(reason)) => EventMetrics::record_skipped(reason.as_str()),
            Ok(RecordOutcome::StopRequested) => self.stopped = true,
            Ok(RecordOutcome::Processed { .. }) => {}
            Err(e) => {
                warn!(error = %e, "Change event consumer failed");
                self.stopped = true;
            }
        }
        outcome
    }

    fn process(&mut self, record: RawChangeRecord) -> Result<RecordOutcome> {
        let RawChangeRecord {
            topic,
            key,
            value,
            offset: raw_offset,
        } = record;

        let value = match value {
            Some(value) => value,
            None => return Ok(RecordOutcome::Skipped(SkipReason::NoValue)),
        };

        // The connector redelivers the last record at its restart offset.
        // Snapshots restart from scratch, so only streaming records are checked.
        let offset = SourceOffset::new(&raw_offset, &self.gate);
        if !offset.is_snapshot() && self.is_duplicate(&offset) {
            debug!(position = %offset.position(), "Got duplicated event");
            return Ok(RecordOutcome::Skipped(SkipReason::Duplicate));
        }

        let change = match value {
            ChangeValue::Row(change) => change,
            ChangeValue::Schema(change) => return Ok(self.handle_schema_change(change, &offset)),
        };

        let operation = change.operation();
        let op = match operation.dml_type() {
            Some(op) => op,
            None => {
                warn!(op = %change.op, "Skipping unknown operation type");
                return Ok(RecordOutcome::Skipped(SkipReason::UnknownOperation));
            }
        };

        let table = match topic.as_deref().and_then(table_from_topic) {
            Some(table) => table,
            None => {
                warn!(topic = ?topic, "Skipping record with unexpected topic");
                return Ok(RecordOutcome::Skipped(SkipReason::MalformedTopic));
            }
        };

        let interest = self.registry.interest(&table);
        if let TableInterest::Ignored = interest {
            debug!(table = %table, "Skipping table that is not replicated");
            return Ok(RecordOutcome::Skipped(SkipReason::TableNotSelected));
        }

        let key = match key {
            Some(key) => key,
            None => {
                return Err(DeltaError::MissingPrimaryKey {
                    database: self.database.clone(),
                    table: table.table.clone(),
                })
            }
        };

        let RowChange {
            before,
            after,
            ts_ms,
            transaction_id,
            ..
        } = change;
        let before = before.map(|row| interest.project(row));
        let after = after.map(|row| interest.project(row));

        let row = match operation {
            Operation::Delete => before.clone(),
            _ => after,
        };
        let row = match row {
            Some(row) => row,
            None => {
                warn!(
                    table = %table,
                    database = %self.database,
                    "There is no value in the source record"
                );
                return Ok(RecordOutcome::Skipped(SkipReason::NoRow));
            }
        };

        let mut ddl_events = 0;
        if !self.gate.has_sent(&table) {
            let ddl_offset = SourceOffset::new(&raw_offset, &self.gate);
            let primary_key = key.schema().field_names();

            let mut burst = Vec::with_capacity(3);
            let ddl = |operation| {
                DdlEvent::new(
                    operation,
                    self.database.clone(),
                    ddl_offset.to_offset(),
                    ddl_offset.is_snapshot(),
                )
            };
            if self.replicate_existing_data {
                // reset whatever schema a previous run left behind
                burst.push(ddl(DdlOperation::DropTable).with_table(&table));
            }
            burst.push(ddl(DdlOperation::CreateDatabase).with_schema_name(table.schema.clone()));
            burst.push(
                ddl(DdlOperation::CreateTable)
                    .with_table(&table)
                    .with_row_schema(row.schema().clone())
                    .with_primary_key(primary_key),
            );

            for event in burst {
                let operation = event.operation;
                if !self.emit(event.into()) {
                    return Ok(RecordOutcome::StopRequested);
                }
                EventMetrics::ddl_emitted(operation.as_str());
                ddl_events += 1;
            }

            info!(table = %table, database = %self.database, "Sent DDL events for table");
        }
        self.gate.mark_sent(table.clone());

        if interest.is_blacklisted(op) {
            debug!(table = %table, op = %op, "Skipping blacklisted operation");
            if ddl_events == 0 {
                return Ok(RecordOutcome::Skipped(SkipReason::Blacklisted));
            }
            EventMetrics::record_skipped(SkipReason::Blacklisted.as_str());
            return Ok(RecordOutcome::Processed {
                ddl_events,
                dml_events: 0,
            });
        }

        let dml_offset = SourceOffset::new(&raw_offset, &self.gate);
        let previous_row = match operation {
            Operation::Update => before,
            _ => None,
        };
        let event = DmlEvent::new(
            op,
            self.database.clone(),
            &table,
            row,
            dml_offset.to_offset(),
            dml_offset.is_snapshot(),
        )
        .with_previous_row(previous_row)
        .with_ingest_timestamp(ts_ms.unwrap_or(0))
        .with_transaction_id(transaction_id);

        if !self.emit(event.into()) {
            return Ok(RecordOutcome::StopRequested);
        }
        EventMetrics::dml_emitted(op.as_str(), &table.to_string());

        Ok(RecordOutcome::Processed {
            ddl_events,
            dml_events: 1,
        })
    }

    fn is_duplicate(&self, offset: &SourceOffset) -> bool {
        self.latest_offset
            .as_ref()
            .map_or(false, |latest| offset.is_before_or_at(latest))
    }

    fn handle_schema_change(&self, change: SchemaChange, offset: &SourceOffset) -> RecordOutcome {
        let statement = change.ddl.trim_start().to_ascii_uppercase();
        if !(statement.starts_with("CREATE DATABASE") || statement.starts_with("CREATE SCHEMA")) {
            debug!(ddl = %change.ddl, "Ignoring schema change statement");
            return RecordOutcome::Skipped(SkipReason::IgnoredSchemaChange);
        }

        let database = if change.database.is_empty() {
            self.database.clone()
        } else {
            change.database
        };
        let event = DdlEvent::new(
            DdlOperation::CreateDatabase,
            database,
            offset.to_offset(),
            offset.is_snapshot(),
        );

        if !self.emit(event.into()) {
            return RecordOutcome::StopRequested;
        }
        EventMetrics::ddl_emitted(DdlOperation::CreateDatabase.as_str());

        RecordOutcome::Processed {
            ddl_events: 1,
            dml_events: 0,
        }
    }

    /// Returns false when the emitter was interrupted
    fn emit(&self, event: ChangeEvent) -> bool {
        let kind = match event {
            ChangeEvent::Ddl(_) => "ddl",
            ChangeEvent::Dml(_) => "dml",
        };
        let _timer = PerfTimer::new("delta_emit_duration_seconds").with_label("kind", kind);

        match self.emitter.emit(event) {
            Ok(()) => true,
            Err(EmitError::Interrupted) => {
                // nothing is retried, the connector stops right away
                warn!("Interrupted while emitting an event, requesting stop");
                EventMetrics::emit_interrupted();
                false
            }
        }
    }
}
