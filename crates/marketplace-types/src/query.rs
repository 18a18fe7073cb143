//! Structured order queries.
//!
//! Filters are composed from typed predicates instead of concatenated query
//! fragments. A query matches an order when every predicate matches.

use crate::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Default page size when none is requested.
pub const DEFAULT_PER_PAGE: u32 = 20;
/// Largest page size a caller may request.
pub const MAX_PER_PAGE: u32 = 100;

/// A single order filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPredicate {
	/// Orders placed by this customer.
	Customer(u64),
	/// Orders with at least one line sold by this provider.
	Provider(u64),
	/// Orders currently in this status.
	Status(OrderStatus),
}

impl OrderPredicate {
	pub fn matches(&self, order: &Order) -> bool {
		match self {
			OrderPredicate::Customer(id) => order.customer_id == *id,
			OrderPredicate::Provider(id) => order.involves_provider(*id),
			OrderPredicate::Status(status) => order.status == *status,
		}
	}
}

/// Composable order query with pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
	predicates: Vec<OrderPredicate>,
	page: u32,
	per_page: u32,
}

impl Default for OrderQuery {
	fn default() -> Self {
		Self::new()
	}
}

impl OrderQuery {
	/// A query matching every order, first page.
	pub fn new() -> Self {
		Self {
			predicates: Vec::new(),
			page: 1,
			per_page: DEFAULT_PER_PAGE,
		}
	}

	pub fn customer(self, customer_id: u64) -> Self {
		self.with(OrderPredicate::Customer(customer_id))
	}

	pub fn provider(self, provider_id: u64) -> Self {
		self.with(OrderPredicate::Provider(provider_id))
	}

	pub fn status(self, status: OrderStatus) -> Self {
		self.with(OrderPredicate::Status(status))
	}

	/// Adds an arbitrary predicate.
	pub fn with(mut self, predicate: OrderPredicate) -> Self {
		self.predicates.push(predicate);
		self
	}

	/// Selects a page. Page numbers start at 1 and sizes are clamped to
	/// `1..=MAX_PER_PAGE`.
	pub fn paginate(mut self, page: u32, per_page: u32) -> Self {
		self.page = page.max(1);
		self.per_page = per_page.clamp(1, MAX_PER_PAGE);
		self
	}

	pub fn predicates(&self) -> &[OrderPredicate] {
		&self.predicates
	}

	pub fn matches(&self, order: &Order) -> bool {
		self.predicates.iter().all(|p| p.matches(order))
	}

	/// Cuts the requested page out of an already filtered and sorted list.
	pub fn page_of<T>(&self, items: Vec<T>) -> Page<T> {
		let total = items.len() as u64;
		let skip = (self.page as usize - 1).saturating_mul(self.per_page as usize);
		let items = items
			.into_iter()
			.skip(skip)
			.take(self.per_page as usize)
			.collect();

		Page {
			items,
			page: self.page,
			per_page: self.per_page,
			total,
		}
	}
}

/// One page of query results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub page: u32,
	pub per_page: u32,
	/// Number of matching items across all pages.
	pub total: u64,
}
