//! Handlers for marketplace operations.
//!
//! Order creation and preparation-side transitions live in [`OrderHandler`];
//! delivery assignment, completion and delivery-person views live in
//! [`DeliveryHandler`].

pub mod delivery;
pub mod order;

pub use delivery::DeliveryHandler;
pub use order::OrderHandler;
