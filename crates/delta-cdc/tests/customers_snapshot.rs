use chrono::NaiveDate;
use delta_cdc::{ChangeEventConsumer, EventReader, RawChangeRecord, ReaderReport};
use delta_core::{
    ChangeEvent, DdlOperation, DmlOperation, NoopContext, Offset, QueueEmitter, Result,
};
use delta_shared::{DeltaConfig, SourceConfig};
use serde_json::{json, Value};
use std::sync::Arc;

fn source_config() -> SourceConfig {
    let mut config = DeltaConfig::default().source;
    config.database = "inventory".to_string();
    config
}

fn value_schema() -> Value {
    let row = |field: &str| {
        json!({
            "field": field,
            "type": "struct",
            "name": "delta-server.dbo.customers.Value",
            "optional": true,
            "fields": [
                {"field": "id", "type": "int32", "optional": false},
                {"field": "name", "type": "string", "optional": false},
                {"field": "bday", "type": "int32", "optional": true, "name": "io.debezium.time.Date"}
            ]
        })
    };
    json!({
        "type": "struct",
        "name": "delta-server.dbo.customers.Envelope",
        "fields": [
            row("before"),
            row("after"),
            {"field": "op", "type": "string", "optional": false},
            {"field": "ts_ms", "type": "int64", "optional": true}
        ]
    })
}

fn customer_line(id: i64, name: &str, bday: i64, pos: u64) -> String {
    json!({
        "topic": "delta-server.dbo.customers",
        "key": {
            "schema": {
                "type": "struct",
                "name": "delta-server.dbo.customers.Key",
                "fields": [{"field": "id", "type": "int32", "optional": false}]
            },
            "payload": {"id": id}
        },
        "value": {
            "schema": value_schema(),
            "payload": {
                "before": null,
                "after": {"id": id, "name": name, "bday": bday},
                "op": "r",
                "ts_ms": 1_600_000_000_000i64
            }
        },
        "offset": {"file": "mysql-bin.000003", "pos": pos, "snapshot": true}
    })
    .to_string()
}

/// Capture of a snapshot of `customers(id INT PK, name VARCHAR, bday DATE NULL)`
fn snapshot_capture() -> Vec<String> {
    vec![
        json!({
            "topic": "delta-server",
            "value": {"databaseName": "inventory", "ddl": "CREATE DATABASE inventory"},
            "offset": {"file": "mysql-bin.000003", "pos": 154, "snapshot": true}
        })
        .to_string(),
        json!({
            "topic": "delta-server",
            "value": {
                "databaseName": "inventory",
                "ddl": "CREATE TABLE customers (id INT PRIMARY KEY, name VARCHAR(255), bday DATE NULL)"
            },
            "offset": {"file": "mysql-bin.000003", "pos": 154, "snapshot": true}
        })
        .to_string(),
        customer_line(0, "alice", 0, 154),
        customer_line(1, "bob", 365, 154),
    ]
}

fn records(lines: Vec<String>) -> Vec<Result<RawChangeRecord>> {
    lines
        .iter()
        .map(|line| RawChangeRecord::from_json_line(line))
        .collect()
}

async fn replay(lines: Vec<String>, latest: &Offset) -> (ReaderReport, Vec<ChangeEvent>) {
    let (emitter, queue, _handle) = QueueEmitter::bounded(64);
    let consumer =
        ChangeEventConsumer::new(&source_config(), emitter, Arc::new(NoopContext), latest)
            .unwrap();

    let report = EventReader::start(records(lines), consumer)
        .join()
        .await
        .unwrap();
    (report, queue.drain())
}

#[tokio::test]
async fn snapshot_of_customers_yields_four_ddl_and_two_inserts() {
    let (report, events) = replay(snapshot_capture(), &Offset::new()).await;

    assert!(!report.stopped);
    assert_eq!(report.records, 4);
    assert_eq!(report.skipped, 1);

    let ddl: Vec<_> = events.iter().filter_map(ChangeEvent::as_ddl).collect();
    let dml: Vec<_> = events.iter().filter_map(ChangeEvent::as_dml).collect();

    assert_eq!(ddl.len(), 4);
    assert_eq!(
        ddl.iter().map(|e| e.operation).collect::<Vec<_>>(),
        vec![
            DdlOperation::CreateDatabase,
            DdlOperation::DropTable,
            DdlOperation::CreateDatabase,
            DdlOperation::CreateTable,
        ]
    );
    assert_eq!(ddl[3].table_name.as_deref(), Some("customers"));
    assert_eq!(ddl[3].primary_key, vec!["id"]);
    assert!(ddl.iter().all(|e| e.is_snapshot));

    assert_eq!(dml.len(), 2);
    assert!(dml.iter().all(|e| e.operation_type == DmlOperation::Insert));

    let alice = &dml[0].row;
    assert_eq!(alice.get("id"), Some(&json!(0)));
    assert_eq!(alice.get("name"), Some(&json!("alice")));
    assert_eq!(alice.get_date("bday"), NaiveDate::from_ymd_opt(1970, 1, 1));

    let bob = &dml[1].row;
    assert_eq!(bob.get("id"), Some(&json!(1)));
    assert_eq!(bob.get("name"), Some(&json!("bob")));
    assert_eq!(bob.get_date("bday"), NaiveDate::from_ymd_opt(1971, 1, 1));
    assert_eq!(dml[1].ingest_timestamp, 1_600_000_000_000);
}

#[tokio::test]
async fn streaming_redelivery_after_restart_is_suppressed() {
    let streaming = |id: i64, name: &str, pos: u64| {
        customer_line(id, name, 0, pos)
            .replace(r#""op":"r""#, r#""op":"c""#)
            .replace(r#""snapshot":true"#, r#""snapshot":false"#)
    };

    let first_run = vec![streaming(2, "carol", 900), streaming(3, "dave", 1000)];
    let (_, events) = replay(first_run.clone(), &Offset::new()).await;
    assert_eq!(events.len(), 5);
    let acknowledged = events.last().map(|e| e.offset().clone()).unwrap();

    // the connector replays from the last acknowledged position
    let mut second_run = first_run;
    second_run.push(streaming(4, "erin", 1100));
    let (report, events) = replay(second_run, &acknowledged).await;

    assert_eq!(report.skipped, 2);
    assert_eq!(events.len(), 4);
    let dml = events[3].as_dml().unwrap();
    assert_eq!(dml.row.get("name"), Some(&json!("erin")));
    assert!(!dml.is_snapshot);
}

#[tokio::test]
async fn keyless_table_stops_the_reader() {
    let line = json!({
        "topic": "delta-server.dbo.audit_log",
        "key": null,
        "value": {"op": "c", "after": {"message": "boot"}},
        "offset": {"file": "mysql-bin.000003", "pos": 2000}
    })
    .to_string();

    let (emitter, queue, _handle) = QueueEmitter::bounded(8);
    let consumer =
        ChangeEventConsumer::new(&source_config(), emitter, Arc::new(NoopContext), &Offset::new())
            .unwrap();

    let result = EventReader::start(records(vec![line]), consumer).join().await;
    let error = result.unwrap_err();
    assert!(error.is_fatal());
    assert!(error.to_string().contains("audit_log"));
    assert!(queue.is_empty());
}
