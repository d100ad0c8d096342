//! Core change event types, table registry and DDL gate for Delta

pub mod context;
pub mod emitter;
pub mod error;
pub mod event;
pub mod gate;
pub mod offset;
pub mod registry;
pub mod row;

pub use context::*;
pub use emitter::*;
pub use error::*;
pub use event::*;
pub use gate::*;
pub use offset::*;
pub use registry::*;
pub use row::*;
