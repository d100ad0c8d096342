//! Change event consumer for Delta
//!
//! Turns raw records from a log-tailing CDC connector into ordered schema
//! (DDL) and row (DML) change events for a downstream replication pipeline.

pub mod consumer;
pub mod envelope;
pub mod offset;
pub mod position;
pub mod reader;
pub mod record;
pub mod topic;

pub use consumer::*;
pub use envelope::*;
pub use offset::*;
pub use position::*;
pub use reader::*;
pub use record::*;
pub use topic::*;
