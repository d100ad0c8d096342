//! Structured rows and their schemas
//!
//! A [`Row`] pairs a [`Schema`] with positionally aligned JSON values. Rows are
//! immutable once built; projection produces a new row.

use crate::{DeltaError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Column type as announced by the connector
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bytes,
    /// Days since the unix epoch
    Date,
    /// Milliseconds since the unix epoch
    Timestamp,
    Decimal,
    Json,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Float32 => "float32",
            FieldType::Float64 => "float64",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
            FieldType::Decimal => "decimal",
            FieldType::Json => "json",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub optional: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            optional: false,
        }
    }

    pub fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            optional: true,
            ..Self::new(name, field_type)
        }
    }
}

/// Ordered record schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Schema {
    pub name: Option<String>,
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn record(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: Some(name.into()),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A structured row value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RowParts")]
pub struct Row {
    schema: Schema,
    values: Vec<Value>,
}

/// Wire form of a [`Row`], validated on the way in
#[derive(Deserialize)]
struct RowParts {
    schema: Schema,
    values: Vec<Value>,
}

impl TryFrom<RowParts> for Row {
    type Error = DeltaError;

    fn try_from(parts: RowParts) -> Result<Self> {
        Row::new(parts.schema, parts.values)
    }
}

impl Row {
    /// Build a row from a schema and values in field order
    pub fn new(schema: Schema, values: Vec<Value>) -> Result<Self> {
        if schema.len() != values.len() {
            return Err(DeltaError::InvalidRecord(format!(
                "row has {} values for {} fields",
                values.len(),
                schema.len()
            )));
        }
        Ok(Self { schema, values })
    }

    pub fn builder(schema: Schema) -> RowBuilder {
        RowBuilder::new(schema)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.position(name).and_then(|i| self.values.get(i))
    }

    /// Read a `Date` column stored as epoch days
    pub fn get_date(&self, name: &str) -> Option<NaiveDate> {
        let days = self.get(name)?.as_i64()?;
        NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.schema.fields.iter().zip(self.values.iter())
    }

    /// Keep only the named columns, preserving declaration order.
    ///
    /// An empty selection keeps every column. Selected names absent from the
    /// row are ignored.
    pub fn keep_selected_columns(&self, columns: &BTreeSet<String>) -> Row {
        if columns.is_empty() {
            return self.clone();
        }

        let (fields, values) = self
            .iter()
            .filter(|(field, _)| columns.contains(&field.name))
            .map(|(field, value)| (field.clone(), value.clone()))
            .unzip();

        Row {
            schema: Schema {
                name: self.schema.name.clone(),
                fields,
            },
            values,
        }
    }

    /// Flatten into a JSON object keyed by column name
    pub fn to_json(&self) -> Value {
        let map = self
            .iter()
            .map(|(field, value)| (field.name.clone(), value.clone()))
            .collect();
        Value::Object(map)
    }
}

/// Incremental row construction by column name
pub struct RowBuilder {
    schema: Schema,
    values: Vec<Value>,
    unknown: Vec<String>,
}

impl RowBuilder {
    fn new(schema: Schema) -> Self {
        let values = vec![Value::Null; schema.len()];
        Self {
            schema,
            values,
            unknown: Vec::new(),
        }
    }

    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        match self.schema.position(name) {
            Some(i) => self.values[i] = value.into(),
            None => self.unknown.push(name.to_string()),
        }
        self
    }

    pub fn build(self) -> Result<Row> {
        if !self.unknown.is_empty() {
            return Err(DeltaError::InvalidRecord(format!(
                "unknown columns: {}",
                self.unknown.join(", ")
            )));
        }

        if let Some(field) = self.iter_missing().next() {
            return Err(DeltaError::InvalidRecord(format!(
                "column '{}' is not nullable",
                field
            )));
        }

        Ok(Row {
            schema: self.schema,
            values: self.values,
        })
    }

    fn iter_missing(&self) -> impl Iterator<Item = &str> {
        self.schema
            .fields
            .iter()
            .zip(self.values.iter())
            .filter(|(field, value)| !field.optional && value.is_null())
            .map(|(field, _)| field.name.as_str())
    }
}
