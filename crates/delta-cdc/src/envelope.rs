//! Kafka Connect JSON envelope decoding
//!
//! Connector output captured as JSON lines, one record per line:
//!
//! ```json
//! {"topic": "server.dbo.customers", "key": {...}, "value": {...},
//!  "offset": {"file": "mysql-bin.000003", "pos": 154, "snapshot": true}}
//! ```
//!
//! `key` and `value` are either `{"schema": ..., "payload": ...}` envelopes as
//! written by the JSON converter with schemas enabled, or bare payloads whose
//! column types are inferred.

use crate::{ChangeValue, RawChangeRecord, RawOffset, RowChange, SchemaChange};
use delta_core::{DeltaError, Field, FieldType, Result, Row, Schema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One captured connector record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRecord {
    pub topic: Option<String>,
    #[serde(default)]
    pub key: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    pub offset: RawOffset,
}

impl RawChangeRecord {
    pub fn from_json_line(line: &str) -> Result<Self> {
        let record: ConnectRecord = serde_json::from_str(line)?;
        Self::try_from(record)
    }
}

impl TryFrom<ConnectRecord> for RawChangeRecord {
    type Error = DeltaError;

    fn try_from(record: ConnectRecord) -> Result<Self> {
        let key = match &record.key {
            Some(key) => {
                let (schema, payload) = split_envelope(key);
                decode_struct(schema, payload)?
            }
            None => None,
        };

        let value = match &record.value {
            Some(value) => decode_value(value)?,
            None => None,
        };

        Ok(RawChangeRecord {
            topic: record.topic,
            key,
            value,
            offset: record.offset,
        })
    }
}

fn split_envelope(value: &Value) -> (Option<&Value>, &Value) {
    match value {
        Value::Object(map) if map.len() == 2 && map.contains_key("schema") => {
            match map.get("payload") {
                Some(payload) => (map.get("schema"), payload),
                None => (None, value),
            }
        }
        _ => (None, value),
    }
}

fn decode_value(value: &Value) -> Result<Option<ChangeValue>> {
    let (schema, payload) = split_envelope(value);
    let fields = match payload {
        Value::Null => return Ok(None),
        Value::Object(fields) => fields,
        other => {
            return Err(DeltaError::InvalidRecord(format!(
                "value payload must be an object, got {}",
                other
            )))
        }
    };

    if let Some(ddl) = fields.get("ddl").and_then(Value::as_str) {
        let database = fields
            .get("databaseName")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Ok(Some(ChangeValue::Schema(SchemaChange {
            database: database.to_string(),
            ddl: ddl.to_string(),
        })));
    }

    let before = decode_struct(
        sub_schema(schema, "before"),
        fields.get("before").unwrap_or(&Value::Null),
    )?;
    let after = decode_struct(
        sub_schema(schema, "after"),
        fields.get("after").unwrap_or(&Value::Null),
    )?;

    Ok(Some(ChangeValue::Row(RowChange {
        op: fields
            .get("op")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        before,
        after,
        ts_ms: fields.get("ts_ms").and_then(Value::as_i64),
        transaction_id: fields
            .get("transaction")
            .and_then(|tx| tx.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string),
    })))
}

/// Schema of a named field inside a struct schema
fn sub_schema<'a>(schema: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    schema?
        .get("fields")?
        .as_array()?
        .iter()
        .find(|field| field.get("field").and_then(Value::as_str) == Some(name))
}

fn decode_struct(schema: Option<&Value>, payload: &Value) -> Result<Option<Row>> {
    let values = match payload {
        Value::Null => return Ok(None),
        Value::Object(values) => values,
        other => {
            return Err(DeltaError::InvalidRecord(format!(
                "row payload must be an object, got {}",
                other
            )))
        }
    };

    let row_schema = match schema {
        Some(schema) => decode_schema(schema)?,
        None => infer_schema(values),
    };

    let row_values = row_schema
        .fields
        .iter()
        .map(|field| values.get(&field.name).cloned().unwrap_or(Value::Null))
        .collect();

    Row::new(row_schema, row_values).map(Some)
}

fn decode_schema(schema: &Value) -> Result<Schema> {
    let fields = schema
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| DeltaError::InvalidRecord("struct schema without fields".into()))?;

    let fields = fields
        .iter()
        .map(|field| {
            let name = field
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| DeltaError::InvalidRecord("schema field without name".into()))?;
            let type_name = field.get("type").and_then(Value::as_str).unwrap_or_default();
            let logical = field.get("name").and_then(Value::as_str);
            let optional = field.get("optional").and_then(Value::as_bool).unwrap_or(false);

            Ok(Field {
                name: name.to_string(),
                field_type: connect_type(type_name, logical)?,
                optional,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Schema {
        name: schema.get("name").and_then(Value::as_str).map(str::to_string),
        fields,
    })
}

fn connect_type(type_name: &str, logical: Option<&str>) -> Result<FieldType> {
    match logical {
        Some("io.debezium.time.Date") | Some("org.apache.kafka.connect.data.Date") => {
            return Ok(FieldType::Date)
        }
        Some("io.debezium.time.Timestamp") | Some("org.apache.kafka.connect.data.Timestamp") => {
            return Ok(FieldType::Timestamp)
        }
        Some("org.apache.kafka.connect.data.Decimal") => return Ok(FieldType::Decimal),
        Some("io.debezium.data.Json") => return Ok(FieldType::Json),
        _ => {}
    }

    let field_type = match type_name {
        "boolean" => FieldType::Boolean,
        "int8" => FieldType::Int8,
        "int16" => FieldType::Int16,
        "int32" => FieldType::Int32,
        "int64" => FieldType::Int64,
        "float" | "float32" => FieldType::Float32,
        "double" | "float64" => FieldType::Float64,
        "string" => FieldType::String,
        "bytes" => FieldType::Bytes,
        "struct" | "array" | "map" => FieldType::Json,
        other => {
            return Err(DeltaError::InvalidRecord(format!(
                "unsupported connect type '{}'",
                other
            )))
        }
    };
    Ok(field_type)
}

/// Best-effort schema for a bare payload.
///
/// Every column is nullable and typed from the value at hand, so a column that
/// is `null` in this row is typed `String` whatever it holds elsewhere. Captures
/// whose table schema matters should keep the converter's schema envelope.
fn infer_schema(values: &Map<String, Value>) -> Schema {
    let fields = values
        .iter()
        .map(|(name, value)| {
            let field_type = match value {
                Value::Bool(_) => FieldType::Boolean,
                Value::Number(n) if n.is_i64() || n.is_u64() => FieldType::Int64,
                Value::Number(_) => FieldType::Float64,
                Value::String(_) | Value::Null => FieldType::String,
                Value::Array(_) | Value::Object(_) => FieldType::Json,
            };
            Field::nullable(name.clone(), field_type)
        })
        .collect();

    Schema { name: None, fields }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn customers_value_schema() -> Value {
        let row = json!({
            "type": "struct",
            "name": "delta-server.dbo.customers.Value",
            "optional": true,
            "fields": [
                {"field": "id", "type": "int32", "optional": false},
                {"field": "name", "type": "string", "optional": true},
                {"field": "bday", "type": "int32", "optional": true, "name": "io.debezium.time.Date"}
            ]
        });
        let mut before = row.clone();
        before["field"] = json!("before");
        let mut after = row;
        after["field"] = json!("after");

        json!({
            "type": "struct",
            "fields": [
                before,
                after,
                {"field": "op", "type": "string", "optional": false},
                {"field": "ts_ms", "type": "int64", "optional": true}
            ]
        })
    }

    #[test]
    fn test_decode_enveloped_record() {
        let line = json!({
            "topic": "delta-server.dbo.customers",
            "key": {
                "schema": {"type": "struct", "fields": [{"field": "id", "type": "int32", "optional": false}]},
                "payload": {"id": 0}
            },
            "value": {
                "schema": customers_value_schema(),
                "payload": {
                    "before": null,
                    "after": {"id": 0, "name": "alice", "bday": 0},
                    "op": "r",
                    "ts_ms": 1_600_000_000_000i64,
                    "transaction": {"id": "tx-9"}
                }
            },
            "offset": {"file": "mysql-bin.000003", "pos": 154, "snapshot": true}
        })
        .to_string();

        let record = RawChangeRecord::from_json_line(&line).unwrap();
        assert_eq!(record.topic.as_deref(), Some("delta-server.dbo.customers"));
        assert!(record.offset.snapshot);
        assert_eq!(record.key.unwrap().schema().field_names(), vec!["id"]);

        let change = match record.value {
            Some(ChangeValue::Row(change)) => change,
            other => panic!("unexpected value {:?}", other),
        };
        assert_eq!(change.op, "r");
        assert_eq!(change.ts_ms, Some(1_600_000_000_000));
        assert_eq!(change.transaction_id.as_deref(), Some("tx-9"));
        assert!(change.before.is_none());

        let after = change.after.unwrap();
        assert_eq!(after.schema().name.as_deref(), Some("delta-server.dbo.customers.Value"));
        assert_eq!(after.schema().field("bday").unwrap().field_type, FieldType::Date);
        assert!(after.schema().field("bday").unwrap().optional);
        assert_eq!(after.get_date("bday"), NaiveDate::from_ymd_opt(1970, 1, 1));
    }

    #[test]
    fn test_decode_bare_payload_keeps_column_order() {
        let line = json!({
            "topic": "delta-server.dbo.orders",
            "key": {"order_id": 5, "line": 2},
            "value": {"op": "c", "after": {"order_id": 5, "line": 2, "qty": 1.5, "note": null}},
            "offset": {"file": "mysql-bin.000001", "pos": 10}
        })
        .to_string();

        let record = RawChangeRecord::from_json_line(&line).unwrap();
        assert_eq!(record.key.unwrap().schema().field_names(), vec!["order_id", "line"]);

        let Some(ChangeValue::Row(change)) = record.value else {
            panic!("expected row change");
        };
        let after = change.after.unwrap();
        assert_eq!(after.schema().field("qty").unwrap().field_type, FieldType::Float64);
        assert_eq!(after.schema().field("order_id").unwrap().field_type, FieldType::Int64);
        assert!(change.ts_ms.is_none());

        let note = after.schema().field("note").unwrap();
        assert_eq!(note.field_type, FieldType::String);
        assert!(note.optional);
    }

    #[test]
    fn test_decode_tombstone_and_missing_key() {
        let line = r#"{"topic": "delta-server.dbo.orders", "key": null, "value": null,
                       "offset": {"file": "mysql-bin.000001", "pos": 11}}"#;
        let record = RawChangeRecord::from_json_line(line).unwrap();
        assert!(record.key.is_none());
        assert!(record.value.is_none());
    }

    #[test]
    fn test_decode_schema_change() {
        let line = json!({
            "topic": "delta-server",
            "value": {"databaseName": "inventory", "ddl": "CREATE DATABASE inventory"},
            "offset": {"file": "mysql-bin.000001", "pos": 4, "snapshot": true}
        })
        .to_string();

        let record = RawChangeRecord::from_json_line(&line).unwrap();
        assert_eq!(
            record.value,
            Some(ChangeValue::Schema(SchemaChange {
                database: "inventory".to_string(),
                ddl: "CREATE DATABASE inventory".to_string(),
            }))
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(RawChangeRecord::from_json_line("not json").is_err());

        let line = json!({
            "topic": "delta-server.dbo.orders",
            "value": {"op": "c", "after": [1, 2]},
            "offset": {"file": "mysql-bin.000001", "pos": 10}
        })
        .to_string();
        assert!(matches!(
            RawChangeRecord::from_json_line(&line),
            Err(DeltaError::InvalidRecord(_))
        ));

        assert!(connect_type("uuid", None).is_err());
    }
}
