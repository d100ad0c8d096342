//! Replicated table registry and column projection

use crate::{DmlOperation, Row};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Schema-qualified table identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    pub schema: String,
    pub table: String,
}

impl TableId {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parse `schema.table`
    pub fn parse(qualified: &str) -> Option<Self> {
        let (schema, table) = qualified.split_once('.')?;
        if schema.is_empty() || table.is_empty() || table.contains('.') {
            return None;
        }
        Some(Self::new(schema, table))
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Per-table replication settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSpec {
    pub schema: String,
    pub table: String,

    /// Replicate only these columns (empty = all columns)
    #[serde(default)]
    pub columns: BTreeSet<String>,

    /// Row operations that are never forwarded for this table
    #[serde(default)]
    pub dml_blacklist: HashSet<DmlOperation>,
}

impl TableSpec {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            columns: BTreeSet::new(),
            dml_blacklist: HashSet::new(),
        }
    }

    pub fn include_column(mut self, column: impl Into<String>) -> Self {
        self.columns.insert(column.into());
        self
    }

    pub fn blacklist(mut self, operation: DmlOperation) -> Self {
        self.dml_blacklist.insert(operation);
        self
    }

    pub fn id(&self) -> TableId {
        TableId::new(self.schema.clone(), self.table.clone())
    }

    pub fn is_blacklisted(&self, operation: DmlOperation) -> bool {
        self.dml_blacklist.contains(&operation)
    }

    pub fn project(&self, row: &Row) -> Row {
        row.keep_selected_columns(&self.columns)
    }
}

/// How the registry treats a given table
#[derive(Debug, Clone, Copy)]
pub enum TableInterest<'a> {
    /// Registry is empty: every table, column and operation is replicated
    All,
    Selected(&'a TableSpec),
    /// Registry is non-empty and does not know this table
    Ignored,
}

impl<'a> TableInterest<'a> {
    pub fn spec(&self) -> Option<&'a TableSpec> {
        match self {
            TableInterest::Selected(spec) => Some(spec),
            _ => None,
        }
    }

    /// Apply the column selection, if any
    pub fn project(&self, row: Row) -> Row {
        match self.spec() {
            Some(spec) => spec.project(&row),
            None => row,
        }
    }

    pub fn is_blacklisted(&self, operation: DmlOperation) -> bool {
        self.spec().map_or(false, |spec| spec.is_blacklisted(operation))
    }
}

/// Lookup of table specs by id. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: HashMap<TableId, TableSpec>,
}

impl TableRegistry {
    pub fn new(specs: impl IntoIterator<Item = TableSpec>) -> Self {
        let tables = specs.into_iter().map(|spec| (spec.id(), spec)).collect();
        Self { tables }
    }

    pub fn lookup(&self, id: &TableId) -> Option<&TableSpec> {
        self.tables.get(id)
    }

    pub fn interest(&self, id: &TableId) -> TableInterest<'_> {
        if self.tables.is_empty() {
            return TableInterest::All;
        }
        match self.tables.get(id) {
            Some(spec) => TableInterest::Selected(spec),
            None => TableInterest::Ignored,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }
}
