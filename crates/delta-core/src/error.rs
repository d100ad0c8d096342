//! Error types for Delta core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeltaError {
    #[error("Table '{table}' in database '{database}' has no primary key. Tables without a primary key are not supported.")]
    MissingPrimaryKey { database: String, table: String },

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DeltaError {
    /// Errors that must terminate the pipeline rather than skip a record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeltaError::MissingPrimaryKey { .. } | DeltaError::InternalError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DeltaError>;

impl From<anyhow::Error> for DeltaError {
    fn from(err: anyhow::Error) -> Self {
        DeltaError::InternalError(err.to_string())
    }
}
