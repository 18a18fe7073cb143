//! Order aggregate types for the marketplace.
//!
//! An order is a customer's purchase: one or more priced lines, a delivery
//! destination, a contact snapshot taken at checkout and a status that only
//! moves forward through the order lifecycle.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A customer's order together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
	/// Numeric identifier assigned by storage on creation.
	pub id: u64,
	/// Customer who placed the order.
	pub customer_id: u64,
	/// Contact details captured when the order was placed.
	pub contact: CustomerContact,
	/// Where the order must be delivered.
	pub delivery_info: DeliveryInfo,
	/// Ordered lines, never empty.
	pub lines: Vec<OrderLine>,
	/// Monetary breakdown computed at creation.
	pub totals: OrderTotals,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Unix timestamp (seconds) of creation.
	pub created_at: u64,
	/// Unix timestamp (seconds) of the last status change.
	pub updated_at: u64,
}

impl Order {
	/// Providers owning at least one store referenced by the lines.
	pub fn provider_ids(&self) -> BTreeSet<u64> {
		self.lines.iter().map(|line| line.provider_id).collect()
	}

	/// Returns true if the given provider sells at least one line of this order.
	pub fn involves_provider(&self, provider_id: u64) -> bool {
		self.lines.iter().any(|line| line.provider_id == provider_id)
	}
}

/// One line of an order.
///
/// The unit price is a snapshot taken from the catalog at checkout, so later
/// catalog changes never alter historical orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
	pub product_id: u64,
	/// Product name at the time of ordering.
	pub product_name: String,
	pub store_id: u64,
	/// Owner of `store_id` at the time of ordering.
	pub provider_id: u64,
	pub quantity: u32,
	pub unit_price: Decimal,
}

impl OrderLine {
	/// Unit price multiplied by quantity.
	pub fn line_total(&self) -> Decimal {
		self.unit_price * Decimal::from(self.quantity)
	}
}

/// Monetary breakdown of an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderTotals {
	pub subtotal: Decimal,
	pub tax: Decimal,
	pub delivery_fee: Decimal,
	/// Always `subtotal + tax + delivery_fee`.
	pub total: Decimal,
}

impl OrderTotals {
	/// Builds a breakdown whose total is the sum of its parts.
	pub fn new(subtotal: Decimal, tax: Decimal, delivery_fee: Decimal) -> Self {
		Self {
			subtotal,
			tax,
			delivery_fee,
			total: subtotal + tax + delivery_fee,
		}
	}
}

/// Customer contact snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerContact {
	pub name: String,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub phone: Option<String>,
}

/// Delivery destination of an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryInfo {
	pub street: String,
	pub city: String,
	#[serde(default)]
	pub region: Option<String>,
	pub postal_code: String,
	/// Free-text instructions for the delivery person.
	#[serde(default)]
	pub notes: Option<String>,
}

/// A priced order that has not been persisted yet.
///
/// Storage assigns the identifier and timestamps; the status always starts at
/// [`OrderStatus::Pending`].
#[derive(Debug, Clone)]
pub struct OrderDraft {
	pub customer_id: u64,
	pub contact: CustomerContact,
	pub delivery_info: DeliveryInfo,
	pub lines: Vec<OrderLine>,
	pub totals: OrderTotals,
}

/// Status of an order.
///
/// This is the only status vocabulary used internally. Legacy spellings are
/// normalized at the API boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Order placed, not yet picked up by the provider.
	Pending,
	/// Provider is preparing the order.
	InProgress,
	/// Order is ready to be handed to a delivery person.
	Prepared,
	/// A delivery person has claimed the order.
	InDelivery,
	/// Order reached the customer. Terminal.
	Delivered,
	/// Order was cancelled before preparation finished. Terminal.
	Cancelled,
}

impl OrderStatus {
	/// Returns the canonical string representation.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::InProgress => "in_progress",
			OrderStatus::Prepared => "prepared",
			OrderStatus::InDelivery => "in_delivery",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
		}
	}

	/// Returns true if no transition leaves this status.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
	}

	/// Returns an iterator over all statuses in lifecycle order.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Pending,
			Self::InProgress,
			Self::Prepared,
			Self::InDelivery,
			Self::Delivered,
			Self::Cancelled,
		]
		.into_iter()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|status| status.as_str() == s)
			.ok_or_else(|| UnknownStatus(s.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn line(provider_id: u64, quantity: u32, price: Decimal) -> OrderLine {
		OrderLine {
			product_id: 1,
			product_name: "Item".into(),
			store_id: provider_id * 10,
			provider_id,
			quantity,
			unit_price: price,
		}
	}

	#[test]
	fn test_status_round_trips_through_canonical_names() {
		for status in OrderStatus::all() {
			assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
			let json = serde_json::to_string(&status).unwrap();
			assert_eq!(json, format!("\"{}\"", status.as_str()));
		}
		assert!("en attente".parse::<OrderStatus>().is_err());
	}

	#[test]
	fn test_totals_sum_parts() {
		let totals = OrderTotals::new(Decimal::new(1300, 2), Decimal::ZERO, Decimal::new(200, 2));
		assert_eq!(totals.total, Decimal::new(1500, 2));
	}

	#[test]
	fn test_line_total_and_providers() {
		let a = line(7, 2, Decimal::new(500, 2));
		let b = line(9, 1, Decimal::new(300, 2));
		assert_eq!(a.line_total(), Decimal::new(1000, 2));

		let order = Order {
			id: 1,
			customer_id: 3,
			contact: CustomerContact {
				name: "Amina".into(),
				email: None,
				phone: None,
			},
			delivery_info: DeliveryInfo {
				street: "1 rue Didouche".into(),
				city: "Alger".into(),
				region: None,
				postal_code: "16000".into(),
				notes: None,
			},
			lines: vec![a, b],
			totals: OrderTotals::new(Decimal::new(1300, 2), Decimal::ZERO, Decimal::ZERO),
			status: OrderStatus::Pending,
			created_at: 0,
			updated_at: 0,
		};
		assert!(order.involves_provider(9));
		assert!(!order.involves_provider(8));
		assert_eq!(order.provider_ids().into_iter().collect::<Vec<_>>(), vec![7, 9]);
	}
}
