//! Order and delivery persistence on top of [`StorageService`].
//!
//! Every multi-record write of the order system is one [`WriteBatch`]:
//!
//! - an order row and its lines are inserted together;
//! - a status change is a compare-and-swap on the order row, so it only lands
//!   if the row still holds the state it was read in;
//! - accepting an order inserts the `delivery_by_order` index entry (unique per
//!   order), the delivery and the order status change in one batch.
//!
//! Losing any of these preconditions to a concurrent writer surfaces as
//! [`StorageError::Conflict`] and leaves nothing written.

use crate::{StorageError, StorageService, Versioned, WriteBatch};
use marketplace_types::{
	current_timestamp, CustomerContact, Delivery, DeliveryInfo, DeliveryStatus, Order, OrderDraft,
	OrderLine, OrderQuery, OrderStatus, OrderTotals, Page, StorageKey,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const ORDER_SEQUENCE: &str = "orders";
const DELIVERY_SEQUENCE: &str = "deliveries";

/// Stored form of an order; lines live in their own namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderRow {
	id: u64,
	customer_id: u64,
	contact: CustomerContact,
	delivery_info: DeliveryInfo,
	totals: OrderTotals,
	status: OrderStatus,
	created_at: u64,
	updated_at: u64,
}

impl OrderRow {
	fn with_status(&self, status: OrderStatus) -> Self {
		Self {
			status,
			updated_at: current_timestamp(),
			..self.clone()
		}
	}

	fn into_order(self, lines: Vec<OrderLine>) -> Order {
		Order {
			id: self.id,
			customer_id: self.customer_id,
			contact: self.contact,
			delivery_info: self.delivery_info,
			lines,
			totals: self.totals,
			status: self.status,
			created_at: self.created_at,
			updated_at: self.updated_at,
		}
	}
}

fn unexpected_status(order_id: u64, actual: OrderStatus, expected: OrderStatus) -> StorageError {
	StorageError::Conflict(format!(
		"order {} is {}, expected {}",
		order_id, actual, expected
	))
}

/// Repository for orders and deliveries.
#[derive(Clone)]
pub struct OrderRepository {
	storage: Arc<StorageService>,
}

impl OrderRepository {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Persists a new order together with its lines.
	///
	/// The order gets the next id of the order sequence and starts `pending`.
	pub async fn create_order_with_lines(&self, draft: OrderDraft) -> Result<Order, StorageError> {
		let id = self.storage.next_id(ORDER_SEQUENCE).await?;
		let now = current_timestamp();
		let row = OrderRow {
			id,
			customer_id: draft.customer_id,
			contact: draft.contact,
			delivery_info: draft.delivery_info,
			totals: draft.totals,
			status: OrderStatus::Pending,
			created_at: now,
			updated_at: now,
		};

		let mut batch = WriteBatch::new();
		batch.insert(StorageKey::Orders, id, &row)?;
		batch.insert(StorageKey::OrderLines, id, &draft.lines)?;
		self.storage.commit(batch).await?;

		Ok(row.into_order(draft.lines))
	}

	/// Loads an order with its lines.
	pub async fn get_order(&self, order_id: u64) -> Result<Order, StorageError> {
		let row: OrderRow = self.storage.retrieve(StorageKey::Orders, order_id).await?;
		self.attach_lines(row).await
	}

	async fn attach_lines(&self, row: OrderRow) -> Result<Order, StorageError> {
		let lines: Vec<OrderLine> = self.storage.retrieve(StorageKey::OrderLines, row.id).await?;
		Ok(row.into_order(lines))
	}

	/// Moves an order from `expected` to `target`.
	///
	/// Fails with [`StorageError::Conflict`] if the order is no longer in
	/// `expected`, including when it changes between this read and the write.
	pub async fn transition_order_status(
		&self,
		order_id: u64,
		expected: OrderStatus,
		target: OrderStatus,
	) -> Result<Order, StorageError> {
		let current: Versioned<OrderRow> = self
			.storage
			.retrieve_versioned(StorageKey::Orders, order_id)
			.await?;
		if current.value.status != expected {
			return Err(unexpected_status(order_id, current.value.status, expected));
		}

		let updated = current.value.with_status(target);
		let mut batch = WriteBatch::new();
		batch.compare_and_swap(StorageKey::Orders, order_id, &current, &updated)?;
		self.storage.commit(batch).await?;

		self.attach_lines(updated).await
	}

	/// Assigns a prepared order to a delivery person and moves it to
	/// `in_delivery`.
	///
	/// The delivery index entry is unique per order: a second assignment fails
	/// with [`StorageError::Conflict`] even when both callers saw the order as
	/// prepared.
	pub async fn create_delivery_and_transition(
		&self,
		order_id: u64,
		delivery_person_id: u64,
	) -> Result<(Order, Delivery), StorageError> {
		let current: Versioned<OrderRow> = self
			.storage
			.retrieve_versioned(StorageKey::Orders, order_id)
			.await?;
		if current.value.status != OrderStatus::Prepared {
			return Err(unexpected_status(
				order_id,
				current.value.status,
				OrderStatus::Prepared,
			));
		}

		let delivery_id = self.storage.next_id(DELIVERY_SEQUENCE).await?;
		let now = current_timestamp();
		let delivery = Delivery {
			id: delivery_id,
			order_id,
			delivery_person_id: Some(delivery_person_id),
			status: DeliveryStatus::InProgress,
			created_at: now,
			updated_at: now,
			delivered_at: None,
		};
		let updated = current.value.with_status(OrderStatus::InDelivery);

		let mut batch = WriteBatch::new();
		batch.insert(StorageKey::DeliveryByOrder, order_id, &delivery_id)?;
		batch.insert(StorageKey::Deliveries, delivery_id, &delivery)?;
		batch.compare_and_swap(StorageKey::Orders, order_id, &current, &updated)?;
		self.storage.commit(batch).await?;

		Ok((self.attach_lines(updated).await?, delivery))
	}

	/// Marks the order's delivery and the order itself as delivered.
	///
	/// An order that is already delivered is returned unchanged. Fails with
	/// [`StorageError::NotFound`] when the order has no delivery.
	pub async fn complete_delivery_and_transition(
		&self,
		order_id: u64,
	) -> Result<(Order, Delivery), StorageError> {
		let delivery_id: u64 = self
			.storage
			.retrieve(StorageKey::DeliveryByOrder, order_id)
			.await?;
		let delivery: Versioned<Delivery> = self
			.storage
			.retrieve_versioned(StorageKey::Deliveries, delivery_id)
			.await?;
		let order: Versioned<OrderRow> = self
			.storage
			.retrieve_versioned(StorageKey::Orders, order_id)
			.await?;

		if delivery.value.status == DeliveryStatus::Delivered
			&& order.value.status == OrderStatus::Delivered
		{
			let delivery = delivery.into_inner();
			return Ok((self.attach_lines(order.into_inner()).await?, delivery));
		}
		if order.value.status != OrderStatus::InDelivery {
			return Err(unexpected_status(
				order_id,
				order.value.status,
				OrderStatus::InDelivery,
			));
		}

		let now = current_timestamp();
		let completed = Delivery {
			status: DeliveryStatus::Delivered,
			updated_at: now,
			delivered_at: Some(now),
			..delivery.value.clone()
		};
		let updated = order.value.with_status(OrderStatus::Delivered);

		let mut batch = WriteBatch::new();
		batch.compare_and_swap(StorageKey::Deliveries, delivery_id, &delivery, &completed)?;
		batch.compare_and_swap(StorageKey::Orders, order_id, &order, &updated)?;
		self.storage.commit(batch).await?;

		Ok((self.attach_lines(updated).await?, completed))
	}

	/// Returns the delivery of an order, if it has been accepted.
	pub async fn find_delivery_by_order(
		&self,
		order_id: u64,
	) -> Result<Option<Delivery>, StorageError> {
		let Some(delivery_id) = self
			.storage
			.find::<u64>(StorageKey::DeliveryByOrder, order_id)
			.await?
		else {
			return Ok(None);
		};
		let delivery = self
			.storage
			.retrieve(StorageKey::Deliveries, delivery_id.into_inner())
			.await?;
		Ok(Some(delivery))
	}

	/// Returns the matching orders, newest first, cut to the query's page.
	pub async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>, StorageError> {
		// Rows are read before lines: every row seen here was committed
		// together with its lines, so the line listing below contains them.
		let rows = self.storage.list::<OrderRow>(StorageKey::Orders).await?;
		let mut lines: HashMap<String, Vec<OrderLine>> = self
			.storage
			.list::<Vec<OrderLine>>(StorageKey::OrderLines)
			.await?
			.into_iter()
			.collect();

		let mut orders = Vec::with_capacity(rows.len());
		for (id, row) in rows {
			let order_lines = lines.remove(&id).ok_or_else(|| {
				StorageError::Backend(format!("order {} has no stored lines", id))
			})?;
			let order = row.into_order(order_lines);
			if query.matches(&order) {
				orders.push(order);
			}
		}
		orders.sort_by(|a, b| b.id.cmp(&a.id));

		Ok(query.page_of(orders))
	}

	/// Returns every delivery record.
	pub async fn list_deliveries(&self) -> Result<Vec<Delivery>, StorageError> {
		let mut deliveries: Vec<Delivery> = self
			.storage
			.list::<Delivery>(StorageKey::Deliveries)
			.await?
			.into_iter()
			.map(|(_, delivery)| delivery)
			.collect();
		deliveries.sort_by_key(|d| d.id);
		Ok(deliveries)
	}

	/// Returns the deliveries assigned to one delivery person.
	pub async fn deliveries_for_person(
		&self,
		delivery_person_id: u64,
	) -> Result<Vec<Delivery>, StorageError> {
		Ok(self
			.list_deliveries()
			.await?
			.into_iter()
			.filter(|d| d.is_assigned_to(delivery_person_id))
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use rust_decimal::Decimal;
	use std::str::FromStr;

	fn repository() -> OrderRepository {
		OrderRepository::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	fn draft(customer_id: u64, provider_id: u64) -> OrderDraft {
		let unit_price = Decimal::from_str("5.00").unwrap();
		OrderDraft {
			customer_id,
			contact: CustomerContact {
				name: "Amina".into(),
				email: None,
				phone: Some("0550".into()),
			},
			delivery_info: DeliveryInfo {
				street: "1 rue Didouche".into(),
				city: "Alger".into(),
				region: None,
				postal_code: "16000".into(),
				notes: None,
			},
			lines: vec![OrderLine {
				product_id: 100,
				product_name: "Couscous".into(),
				store_id: 1,
				provider_id,
				quantity: 2,
				unit_price,
			}],
			totals: OrderTotals::new(Decimal::from(10), Decimal::ZERO, Decimal::from(2)),
		}
	}

	async fn prepared_order(repo: &OrderRepository) -> Order {
		let order = repo.create_order_with_lines(draft(1, 10)).await.unwrap();
		repo.transition_order_status(order.id, OrderStatus::Pending, OrderStatus::InProgress)
			.await
			.unwrap();
		repo.transition_order_status(order.id, OrderStatus::InProgress, OrderStatus::Prepared)
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn test_create_and_get_order() {
		let repo = repository();
		let created = repo.create_order_with_lines(draft(1, 10)).await.unwrap();
		assert_eq!(created.id, 1);
		assert_eq!(created.status, OrderStatus::Pending);

		let loaded = repo.get_order(created.id).await.unwrap();
		assert_eq!(loaded, created);
		assert_eq!(loaded.lines.len(), 1);

		assert!(matches!(repo.get_order(99).await, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_stale_transition_conflicts() {
		let repo = repository();
		let order = repo.create_order_with_lines(draft(1, 10)).await.unwrap();

		repo.transition_order_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
			.await
			.unwrap();
		let result = repo
			.transition_order_status(order.id, OrderStatus::Pending, OrderStatus::InProgress)
			.await;
		assert!(matches!(result, Err(StorageError::Conflict(_))));
		assert_eq!(
			repo.get_order(order.id).await.unwrap().status,
			OrderStatus::Cancelled
		);
	}

	#[tokio::test]
	async fn test_delivery_assignment_and_completion() {
		let repo = repository();
		let order = prepared_order(&repo).await;

		let (order, delivery) = repo.create_delivery_and_transition(order.id, 7).await.unwrap();
		assert_eq!(order.status, OrderStatus::InDelivery);
		assert_eq!(delivery.status, DeliveryStatus::InProgress);
		assert!(delivery.is_assigned_to(7));

		assert!(matches!(
			repo.create_delivery_and_transition(order.id, 8).await,
			Err(StorageError::Conflict(_))
		));

		let (order, completed) = repo.complete_delivery_and_transition(order.id).await.unwrap();
		assert_eq!(order.status, OrderStatus::Delivered);
		assert_eq!(completed.status, DeliveryStatus::Delivered);
		assert!(completed.delivered_at.is_some());

		let (again, same) = repo.complete_delivery_and_transition(order.id).await.unwrap();
		assert_eq!(again, order);
		assert_eq!(same, completed);

		assert_eq!(repo.deliveries_for_person(7).await.unwrap(), vec![completed]);
		assert!(repo.deliveries_for_person(8).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_concurrent_assignment_has_one_winner() {
		let repo = repository();
		let order = prepared_order(&repo).await;

		let (first, second) = tokio::join!(
			repo.create_delivery_and_transition(order.id, 7),
			repo.create_delivery_and_transition(order.id, 8),
		);
		let outcomes = [first.is_ok(), second.is_ok()];
		assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
		for result in [first, second] {
			if let Err(e) = result {
				assert!(matches!(e, StorageError::Conflict(_)));
			}
		}
		assert_eq!(repo.list_deliveries().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_completion_without_delivery_is_not_found() {
		let repo = repository();
		let order = prepared_order(&repo).await;
		assert!(matches!(
			repo.complete_delivery_and_transition(order.id).await,
			Err(StorageError::NotFound)
		));
		assert!(repo.find_delivery_by_order(order.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_list_orders_filters_and_pages() {
		let repo = repository();
		for customer in [1, 2, 1] {
			repo.create_order_with_lines(draft(customer, 10 + customer))
				.await
				.unwrap();
		}

		let page = repo
			.list_orders(&OrderQuery::new().customer(1))
			.await
			.unwrap();
		assert_eq!(page.total, 2);
		assert_eq!(
			page.items.iter().map(|o| o.id).collect::<Vec<_>>(),
			vec![3, 1]
		);

		let by_provider = repo
			.list_orders(&OrderQuery::new().provider(12))
			.await
			.unwrap();
		assert_eq!(by_provider.items.len(), 1);
		assert_eq!(by_provider.items[0].customer_id, 2);

		let paged = repo
			.list_orders(&OrderQuery::new().paginate(2, 2))
			.await
			.unwrap();
		assert_eq!(paged.total, 3);
		assert_eq!(paged.items.len(), 1);
		assert_eq!(paged.items[0].id, 1);
	}
}
