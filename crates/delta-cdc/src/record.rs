//! Raw change records delivered by the log-tailing connector

use crate::RawOffset;
use delta_core::{DmlOperation, Row};

/// One record as produced by the connector. Consumed exactly once per delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChangeRecord {
    /// `server.schema.table` for row changes, `server` for schema changes
    pub topic: Option<String>,

    /// Primary key columns of the changed row; absent for keyless tables
    pub key: Option<Row>,

    /// `None` for heartbeats and tombstones
    pub value: Option<ChangeValue>,

    pub offset: RawOffset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeValue {
    Row(RowChange),
    Schema(SchemaChange),
}

/// Row change envelope
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowChange {
    /// One-character operation code (`c`, `r`, `u`, `d`)
    pub op: String,
    pub before: Option<Row>,
    pub after: Option<Row>,
    /// Source commit time in epoch millis
    pub ts_ms: Option<i64>,
    pub transaction_id: Option<String>,
}

/// Database-level schema change statement
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaChange {
    pub database: String,
    pub ddl: String,
}

/// Connector operation code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create,
    /// Row read during the snapshot phase
    Read,
    Update,
    Delete,
    Unknown(String),
}

impl Operation {
    pub fn parse(code: &str) -> Self {
        match code {
            "c" => Operation::Create,
            "r" => Operation::Read,
            "u" => Operation::Update,
            "d" => Operation::Delete,
            other => Operation::Unknown(other.to_string()),
        }
    }

    pub fn dml_type(&self) -> Option<DmlOperation> {
        match self {
            Operation::Create | Operation::Read => Some(DmlOperation::Insert),
            Operation::Update => Some(DmlOperation::Update),
            Operation::Delete => Some(DmlOperation::Delete),
            Operation::Unknown(_) => None,
        }
    }
}

impl RowChange {
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            ..Self::default()
        }
    }

    pub fn with_before(mut self, row: Row) -> Self {
        self.before = Some(row);
        self
    }

    pub fn with_after(mut self, row: Row) -> Self {
        self.after = Some(row);
        self
    }

    pub fn with_ts_ms(mut self, ts_ms: i64) -> Self {
        self.ts_ms = Some(ts_ms);
        self
    }

    pub fn with_transaction_id(mut self, tx_id: impl Into<String>) -> Self {
        self.transaction_id = Some(tx_id.into());
        self
    }

    pub fn operation(&self) -> Operation {
        Operation::parse(&self.op)
    }
}

impl RawChangeRecord {
    pub fn row_change(
        topic: impl Into<String>,
        key: Option<Row>,
        change: RowChange,
        offset: RawOffset,
    ) -> Self {
        Self {
            topic: Some(topic.into()),
            key,
            value: Some(ChangeValue::Row(change)),
            offset,
        }
    }

    pub fn schema_change(
        server: impl Into<String>,
        database: impl Into<String>,
        ddl: impl Into<String>,
        offset: RawOffset,
    ) -> Self {
        Self {
            topic: Some(server.into()),
            key: None,
            value: Some(ChangeValue::Schema(SchemaChange {
                database: database.into(),
                ddl: ddl.into(),
            })),
            offset,
        }
    }
}
