//! Opaque offsets attached to every emitted event
//!
//! The downstream runtime persists these verbatim and hands the latest
//! acknowledged one back on restart. Only the source that produced an offset
//! knows how to interpret its keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Offset {
    fields: BTreeMap<String, String>,
}

impl Offset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// An empty offset means the source has never been acknowledged
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<BTreeMap<String, String>> for Offset {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }
}
