//! Shared utilities and common logic for Delta

pub mod config;
pub mod health;
pub mod observability;

pub use config::*;
pub use health::*;
pub use observability::*;
