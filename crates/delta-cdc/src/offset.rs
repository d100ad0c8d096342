//! Source offsets: connector position plus the tables whose DDL was already sent
//!
//! A [`SourceOffset`] is built fresh for every raw record and flattened into the
//! opaque [`Offset`] that travels with each emitted event. On restart the
//! latest acknowledged `Offset` is parsed back for duplicate suppression.

use crate::{LogPosition, RawOffset};
use delta_core::{DdlGate, DeltaError, Offset, Result, TableId};
use std::collections::BTreeSet;

const FILE_KEY: &str = "file";
const POS_KEY: &str = "pos";
const SNAPSHOT_KEY: &str = "snapshot";
const DDL_TABLES_KEY: &str = "ddl_tables";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOffset {
    position: LogPosition,
    snapshot: bool,
    ddl_sent: BTreeSet<TableId>,
}

impl SourceOffset {
    pub fn new(raw: &RawOffset, gate: &DdlGate) -> Self {
        Self {
            position: raw.position.clone(),
            snapshot: raw.snapshot,
            ddl_sent: gate.sent().clone(),
        }
    }

    pub fn position(&self) -> &LogPosition {
        &self.position
    }

    pub fn is_snapshot(&self) -> bool {
        self.snapshot
    }

    pub fn ddl_sent(&self) -> &BTreeSet<TableId> {
        &self.ddl_sent
    }

    /// True when this streaming offset is not strictly after `other`.
    ///
    /// Snapshot offsets are never before or at anything: a restarted snapshot
    /// replays tables from scratch. A streaming offset is never before or at a
    /// snapshot offset either.
    pub fn is_before_or_at(&self, other: &SourceOffset) -> bool {
        if self.snapshot || other.snapshot {
            return false;
        }
        self.position <= other.position
    }

    pub fn to_offset(&self) -> Offset {
        let tables: Vec<String> = self.ddl_sent.iter().map(TableId::to_string).collect();
        // Vec<String> always serializes
        let tables = serde_json::to_string(&tables).unwrap_or_else(|_| "[]".to_string());

        Offset::new()
            .with(FILE_KEY, self.position.file.clone())
            .with(POS_KEY, self.position.pos.to_string())
            .with(SNAPSHOT_KEY, self.snapshot.to_string())
            .with(DDL_TABLES_KEY, tables)
    }

    /// Parse an offset produced by [`SourceOffset::to_offset`].
    ///
    /// An empty offset means a cold start and yields `None`.
    pub fn from_offset(offset: &Offset) -> Result<Option<Self>> {
        if offset.is_empty() {
            return Ok(None);
        }

        let file = offset
            .get(FILE_KEY)
            .ok_or_else(|| DeltaError::InvalidOffset(format!("missing '{}'", FILE_KEY)))?;
        let pos = offset
            .get(POS_KEY)
            .ok_or_else(|| DeltaError::InvalidOffset(format!("missing '{}'", POS_KEY)))?
            .parse::<u64>()
            .map_err(|e| DeltaError::InvalidOffset(format!("bad '{}': {}", POS_KEY, e)))?;
        let snapshot = match offset.get(SNAPSHOT_KEY) {
            Some(value) => value
                .parse::<bool>()
                .map_err(|e| DeltaError::InvalidOffset(format!("bad '{}': {}", SNAPSHOT_KEY, e)))?,
            None => false,
        };

        let ddl_sent = match offset.get(DDL_TABLES_KEY) {
            Some(raw) => {
                let names: Vec<String> = serde_json::from_str(raw)?;
                names
                    .iter()
                    .map(|name| {
                        TableId::parse(name).ok_or_else(|| {
                            DeltaError::InvalidOffset(format!("bad table id '{}'", name))
                        })
                    })
                    .collect::<Result<BTreeSet<_>>>()?
            }
            None => BTreeSet::new(),
        };

        Ok(Some(Self {
            position: LogPosition::new(file, pos),
            snapshot,
            ddl_sent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming(pos: u64) -> SourceOffset {
        SourceOffset::new(&RawOffset::streaming("mysql-bin.000001", pos), &DdlGate::new())
    }

    fn snapshot(pos: u64) -> SourceOffset {
        SourceOffset::new(&RawOffset::snapshot("mysql-bin.000001", pos), &DdlGate::new())
    }

    #[test]
    fn test_before_or_at_is_not_strict() {
        assert!(streaming(100).is_before_or_at(&streaming(100)));
        assert!(streaming(99).is_before_or_at(&streaming(100)));
        assert!(!streaming(101).is_before_or_at(&streaming(100)));
    }

    #[test]
    fn test_record_after_log_rollover_is_new() {
        let gate = DdlGate::new();
        let latest = SourceOffset::new(&RawOffset::streaming("mysql-bin.999999", 500), &gate);
        let rolled = SourceOffset::new(&RawOffset::streaming("mysql-bin.1000000", 4), &gate);

        assert!(!rolled.is_before_or_at(&latest));
        assert!(latest.is_before_or_at(&rolled));
    }

    #[test]
    fn test_snapshot_is_never_before_or_at() {
        assert!(!snapshot(1).is_before_or_at(&streaming(100)));
        assert!(!snapshot(1).is_before_or_at(&snapshot(100)));
        // streaming data after a snapshot high-water mark is always new
        assert!(!streaming(1).is_before_or_at(&snapshot(100)));
    }

    #[test]
    fn test_offset_round_trip_keeps_ddl_tables() {
        let mut gate = DdlGate::new();
        gate.mark_sent(TableId::new("dbo", "customers"));
        gate.mark_sent(TableId::new("dbo", "orders"));
        let source = SourceOffset::new(&RawOffset::streaming("mysql-bin.000002", 4096), &gate);

        let offset = source.to_offset();
        assert_eq!(offset.get("pos"), Some("4096"));
        assert_eq!(offset.get("ddl_tables"), Some(r#"["dbo.customers","dbo.orders"]"#));

        let parsed = SourceOffset::from_offset(&offset).unwrap().unwrap();
        assert_eq!(parsed, source);
    }

    #[test]
    fn test_from_empty_offset_is_cold_start() {
        assert!(SourceOffset::from_offset(&Offset::new()).unwrap().is_none());
    }

    #[test]
    fn test_from_offset_rejects_garbage() {
        let offset = Offset::new().with("file", "mysql-bin.000001").with("pos", "abc");
        assert!(matches!(
            SourceOffset::from_offset(&offset),
            Err(DeltaError::InvalidOffset(_))
        ));

        let offset = Offset::new().with("pos", "1");
        assert!(SourceOffset::from_offset(&offset).is_err());
    }
}
