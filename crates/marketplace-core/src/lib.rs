//! Core order and delivery logic for the marketplace.
//!
//! This crate holds the order state machine, pricing, the order and delivery
//! handlers and the [`MarketplaceEngine`] facade tying them to the injected
//! storage and catalog services. [`MarketplaceBuilder`] wires an engine from
//! configuration and a set of factory functions.

pub mod builder;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod pricing;
pub mod state;

pub use builder::{BuilderError, MarketplaceBuilder, MarketplaceFactories};
pub use engine::MarketplaceEngine;
pub use error::MarketplaceError;
pub use pricing::Pricing;
pub use state::{OrderStateError, OrderStateMachine};
