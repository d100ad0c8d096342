//! `delta`: convenience façade over the Delta crates.
//!
//! Re-exports the event model from `delta-core` at the crate root, so users can
//! `use delta::*;`, and the consumer and shared utilities as nested modules.

#![deny(missing_docs)]

#[doc(inline)]
pub use delta_core::*;

/// Also expose delta-core as a nested module for `delta::core::...` paths.
pub use delta_core as core;

/// Connector-facing consumer, offsets and record decoding.
pub use delta_cdc as cdc;

/// Configuration, observability and health.
pub use delta_shared as shared;
