//! Delivery types for the marketplace.
//!
//! A delivery records the hand-off of one prepared order to one delivery
//! person. There is at most one delivery per order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery record linking an order to the delivery person carrying it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delivery {
	/// Numeric identifier assigned by storage on creation.
	pub id: u64,
	/// The order being delivered. Unique across deliveries.
	pub order_id: u64,
	/// Assigned delivery person, if any.
	pub delivery_person_id: Option<u64>,
	pub status: DeliveryStatus,
	pub created_at: u64,
	pub updated_at: u64,
	/// Set once the delivery is completed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivered_at: Option<u64>,
}

impl Delivery {
	/// Returns true if the given delivery person is assigned to this delivery.
	pub fn is_assigned_to(&self, delivery_person_id: u64) -> bool {
		self.delivery_person_id == Some(delivery_person_id)
	}
}

/// Status of a delivery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
	/// The delivery person is on the way.
	InProgress,
	/// The order was handed to the customer.
	Delivered,
}

impl fmt::Display for DeliveryStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DeliveryStatus::InProgress => write!(f, "in_progress"),
			DeliveryStatus::Delivered => write!(f, "delivered"),
		}
	}
}

/// Aggregated figures for one delivery person.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryStats {
	pub delivery_person_id: u64,
	/// Number of deliveries with status delivered.
	pub completed_deliveries: u64,
	/// Number of deliveries still in progress.
	pub active_deliveries: u64,
	/// Fraction of each order total paid as commission.
	pub commission_rate: Decimal,
	/// Sum of commissions over completed deliveries, rounded to cents.
	pub total_earnings: Decimal,
}
