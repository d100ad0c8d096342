//! Change log positions as reported by the connector

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Position in the source change log.
///
/// Ordered by log file, then by position inside the file. Log files are named
/// `<base>.<sequence>`; the sequence is compared numerically since it is only
/// zero padded up to six digits. Names without a numeric sequence compare as
/// plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    pub file: String,
    pub pos: u64,
}

impl LogPosition {
    pub fn new(file: impl Into<String>, pos: u64) -> Self {
        Self {
            file: file.into(),
            pos,
        }
    }
}

impl Ord for LogPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_log_files(&self.file, &other.file).then(self.pos.cmp(&other.pos))
    }
}

impl PartialOrd for LogPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn split_sequence(file: &str) -> Option<(&str, u64)> {
    let (base, sequence) = file.rsplit_once('.')?;
    sequence.parse().ok().map(|n| (base, n))
}

fn compare_log_files(a: &str, b: &str) -> Ordering {
    match (split_sequence(a), split_sequence(b)) {
        (Some((base_a, seq_a)), Some((base_b, seq_b))) => base_a
            .cmp(base_b)
            .then(seq_a.cmp(&seq_b))
            // equal sequences with different padding still need a total order
            .then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.pos)
    }
}

/// Offset payload attached by the connector to each raw record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOffset {
    #[serde(flatten)]
    pub position: LogPosition,

    /// True while the connector replays existing table contents
    #[serde(default)]
    pub snapshot: bool,
}

impl RawOffset {
    pub fn streaming(file: impl Into<String>, pos: u64) -> Self {
        Self {
            position: LogPosition::new(file, pos),
            snapshot: false,
        }
    }

    pub fn snapshot(file: impl Into<String>, pos: u64) -> Self {
        Self {
            position: LogPosition::new(file, pos),
            snapshot: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_position_order() {
        let a = LogPosition::new("mysql-bin.000001", 900);
        let b = LogPosition::new("mysql-bin.000002", 4);
        let c = LogPosition::new("mysql-bin.000002", 154);

        assert!(a < b);
        assert!(b < c);
        assert_eq!(c.to_string(), "mysql-bin.000002:154");
    }

    #[test]
    fn test_log_position_order_across_sequence_rollover() {
        let last_padded = LogPosition::new("mysql-bin.999999", 500);
        let rolled = LogPosition::new("mysql-bin.1000000", 4);

        assert!(last_padded < rolled);
        assert!(LogPosition::new("mysql-bin.1000000", 900) < LogPosition::new("mysql-bin.1000001", 4));
        assert_eq!(rolled.cmp(&rolled.clone()), Ordering::Equal);
    }

    #[test]
    fn test_log_position_order_without_sequence() {
        assert!(LogPosition::new("binlog", 10) < LogPosition::new("binlog", 11));
        assert!(LogPosition::new("a.log", 900) < LogPosition::new("b.log", 4));
    }

    #[test]
    fn test_raw_offset_wire_format() {
        let offset: RawOffset =
            serde_json::from_str(r#"{"file": "mysql-bin.000003", "pos": 154, "snapshot": true}"#).unwrap();
        assert_eq!(offset, RawOffset::snapshot("mysql-bin.000003", 154));

        let offset: RawOffset =
            serde_json::from_str(r#"{"file": "mysql-bin.000003", "pos": 200}"#).unwrap();
        assert!(!offset.snapshot);
    }
}
