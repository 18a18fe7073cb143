//! Storage-related types for the marketplace.

use std::str::FromStr;

/// Storage namespaces for the different record collections.
///
/// This enum replaces namespace string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Order rows (without lines)
	Orders,
	/// Lines of an order, keyed by order id
	OrderLines,
	/// Delivery records
	Deliveries,
	/// Unique index from order id to delivery id
	DeliveryByOrder,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::OrderLines => "order_lines",
			StorageKey::Deliveries => "deliveries",
			StorageKey::DeliveryByOrder => "delivery_by_order",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::OrderLines,
			Self::Deliveries,
			Self::DeliveryByOrder,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
