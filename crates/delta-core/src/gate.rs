//! Tracks which tables have already had their schema announced

use crate::TableId;
use std::collections::BTreeSet;

/// Per-table "DDL already sent" flags. Only grows.
#[derive(Debug, Clone, Default)]
pub struct DdlGate {
    sent: BTreeSet<TableId>,
}

impl DdlGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate pre-populated from a previous run
    pub fn seeded(tables: impl IntoIterator<Item = TableId>) -> Self {
        Self {
            sent: tables.into_iter().collect(),
        }
    }

    pub fn has_sent(&self, table: &TableId) -> bool {
        self.sent.contains(table)
    }

    /// Returns true if the table was not marked before
    pub fn mark_sent(&mut self, table: TableId) -> bool {
        self.sent.insert(table)
    }

    pub fn sent(&self) -> &BTreeSet<TableId> {
        &self.sent
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}
