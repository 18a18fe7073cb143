//! State management for orders.
//!
//! This module provides the order state machine: the legal transition table
//! and the rules deciding which actor may take each edge.

pub mod order;

pub use order::{OrderStateError, OrderStateMachine};
