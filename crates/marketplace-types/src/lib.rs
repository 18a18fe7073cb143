//! Common types module for the marketplace order system.
//!
//! This module defines the core data types shared by every marketplace crate:
//! orders and their lines, delivery records, the acting identity, structured
//! order queries, storage keys and the HTTP API envelopes. Keeping them in one
//! place guarantees that every layer speaks the same closed status vocabulary.

/// Actor types describing who performs an operation.
pub mod actor;
/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Delivery records and delivery-person statistics.
pub mod delivery;
/// Order aggregate types including lines, totals and the status enum.
pub mod order;
/// Structured, composable order filters and pagination.
pub mod query;
/// Registry trait for self-registering backend implementations.
pub mod registry;
/// Storage types for managing persistent data.
pub mod storage;
/// Utility helpers shared across crates.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use actor::*;
pub use api::*;
pub use delivery::*;
pub use order::*;
pub use query::*;
pub use registry::*;
pub use storage::*;
pub use utils::current_timestamp;
pub use validation::*;
