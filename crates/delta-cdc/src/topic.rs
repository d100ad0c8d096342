//! Topic name decoding

use delta_core::TableId;

/// Table of a `server.schema.table` row change topic.
///
/// Returns `None` unless the topic has exactly three non-empty segments. The
/// server segment only names the connector instance and is not checked.
pub fn table_from_topic(topic: &str) -> Option<TableId> {
    let mut parts = topic.split('.');
    let server = parts.next()?;
    let schema = parts.next()?;
    let table = parts.next()?;

    if parts.next().is_some() || [server, schema, table].iter().any(|s| s.is_empty()) {
        return None;
    }

    Some(TableId::new(schema, table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_from_topic() {
        assert_eq!(
            table_from_topic("delta-server.dbo.customers"),
            Some(TableId::new("dbo", "customers"))
        );
    }

    #[test]
    fn test_malformed_topics() {
        assert!(table_from_topic("delta-server").is_none());
        assert!(table_from_topic("delta-server.dbo").is_none());
        assert!(table_from_topic("delta-server.dbo.customers.extra").is_none());
        assert!(table_from_topic("delta-server..customers").is_none());
        assert!(table_from_topic("").is_none());
    }
}
