//! Normalized DDL and DML events handed to the replication writer

use crate::{Offset, Row, Schema, TableId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema change operations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DdlOperation {
    CreateDatabase,
    CreateTable,
    DropTable,
}

impl DdlOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DdlOperation::CreateDatabase => "CREATE_DATABASE",
            DdlOperation::CreateTable => "CREATE_TABLE",
            DdlOperation::DropTable => "DROP_TABLE",
        }
    }
}

impl fmt::Display for DdlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row change operations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DmlOperation {
    Insert,
    Update,
    Delete,
}

impl DmlOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DmlOperation::Insert => "INSERT",
            DmlOperation::Update => "UPDATE",
            DmlOperation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for DmlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema change event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DdlEvent {
    pub operation: DdlOperation,
    pub database_name: String,
    pub schema_name: Option<String>,
    pub table_name: Option<String>,
    /// Row schema, only set for `CREATE_TABLE`
    pub schema: Option<Schema>,
    /// Primary key columns in declared order, only set for `CREATE_TABLE`
    pub primary_key: Vec<String>,
    pub offset: Offset,
    pub is_snapshot: bool,
}

impl DdlEvent {
    pub fn new(
        operation: DdlOperation,
        database: impl Into<String>,
        offset: Offset,
        is_snapshot: bool,
    ) -> Self {
        Self {
            operation,
            database_name: database.into(),
            schema_name: None,
            table_name: None,
            schema: None,
            primary_key: Vec::new(),
            offset,
            is_snapshot,
        }
    }

    pub fn with_schema_name(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    /// Set schema and table name from a table id
    pub fn with_table(mut self, table: &TableId) -> Self {
        self.schema_name = Some(table.schema.clone());
        self.table_name = Some(table.table.clone());
        self
    }

    pub fn with_row_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_primary_key(mut self, columns: Vec<String>) -> Self {
        self.primary_key = columns;
        self
    }
}

/// Row change event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DmlEvent {
    pub operation_type: DmlOperation,
    pub database_name: String,
    pub schema_name: String,
    pub table_name: String,
    pub row: Row,
    /// Before image, only set for `UPDATE`
    pub previous_row: Option<Row>,
    pub offset: Offset,
    pub is_snapshot: bool,
    /// Source commit time in epoch millis, 0 when unknown
    pub ingest_timestamp: i64,
    pub transaction_id: Option<String>,
}

impl DmlEvent {
    pub fn new(
        operation_type: DmlOperation,
        database: impl Into<String>,
        table: &TableId,
        row: Row,
        offset: Offset,
        is_snapshot: bool,
    ) -> Self {
        Self {
            operation_type,
            database_name: database.into(),
            schema_name: table.schema.clone(),
            table_name: table.table.clone(),
            row,
            previous_row: None,
            offset,
            is_snapshot,
            ingest_timestamp: 0,
            transaction_id: None,
        }
    }

    pub fn with_previous_row(mut self, row: Option<Row>) -> Self {
        self.previous_row = row;
        self
    }

    pub fn with_ingest_timestamp(mut self, ts_ms: i64) -> Self {
        self.ingest_timestamp = ts_ms;
        self
    }

    pub fn with_transaction_id(mut self, tx_id: Option<String>) -> Self {
        self.transaction_id = tx_id;
        self
    }
}

/// Everything the consumer hands to an emitter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChangeEvent {
    Ddl(DdlEvent),
    Dml(DmlEvent),
}

impl ChangeEvent {
    pub fn offset(&self) -> &Offset {
        match self {
            ChangeEvent::Ddl(event) => &event.offset,
            ChangeEvent::Dml(event) => &event.offset,
        }
    }

    pub fn as_ddl(&self) -> Option<&DdlEvent> {
        match self {
            ChangeEvent::Ddl(event) => Some(event),
            ChangeEvent::Dml(_) => None,
        }
    }

    pub fn as_dml(&self) -> Option<&DmlEvent> {
        match self {
            ChangeEvent::Dml(event) => Some(event),
            ChangeEvent::Ddl(_) => None,
        }
    }
}

impl From<DdlEvent> for ChangeEvent {
    fn from(event: DdlEvent) -> Self {
        ChangeEvent::Ddl(event)
    }
}

impl From<DmlEvent> for ChangeEvent {
    fn from(event: DmlEvent) -> Self {
        ChangeEvent::Dml(event)
    }
}
