//! Marketplace engine exposing every order and delivery operation.
//!
//! The engine owns the handlers and the injected storage and catalog
//! services. It is the single entry point used by the API layer; status
//! updates targeting a delivery edge are routed to the delivery handler so
//! the order and its delivery record never diverge.

use crate::error::MarketplaceError;
use crate::handlers::{DeliveryHandler, OrderHandler};
use crate::pricing::Pricing;
use crate::state::OrderStateMachine;
use marketplace_catalog::CatalogService;
use marketplace_config::Config;
use marketplace_storage::{OrderRepository, StorageService};
use marketplace_types::{
	Actor, CreateOrderRequest, DeliveryResponse, DeliveryStats, Order, OrderQuery, OrderResponse,
	OrderStatus, Page,
};
use std::sync::Arc;
use tracing::instrument;

/// Main marketplace engine.
pub struct MarketplaceEngine {
	/// Marketplace configuration.
	config: Config,
	/// Storage service for persisting orders and deliveries.
	storage: Arc<StorageService>,
	repository: OrderRepository,
	orders: OrderHandler,
	deliveries: DeliveryHandler,
}

impl MarketplaceEngine {
	pub fn new(config: Config, storage: Arc<StorageService>, catalog: Arc<CatalogService>) -> Self {
		let pricing = Pricing::from(&config.pricing);
		let repository = OrderRepository::new(storage.clone());

		Self {
			orders: OrderHandler::new(repository.clone(), catalog, pricing),
			deliveries: DeliveryHandler::new(repository.clone(), pricing),
			repository,
			config,
			storage,
		}
	}

	/// Places a new order on behalf of a customer.
	pub async fn create_order(
		&self,
		actor: &Actor,
		request: CreateOrderRequest,
	) -> Result<Order, MarketplaceError> {
		self.orders.create(actor, request).await
	}

	/// Loads an order together with its delivery record, if any.
	pub async fn get_order(&self, order_id: u64) -> Result<OrderResponse, MarketplaceError> {
		let order = self.orders.get(order_id).await?;
		let delivery = self.repository.find_delivery_by_order(order_id).await?;
		Ok(OrderResponse { order, delivery })
	}

	/// Lists orders matching a structured query.
	pub async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>, MarketplaceError> {
		self.orders.list(query).await
	}

	/// Moves an order to `target`.
	///
	/// `in_delivery` assigns the order to the acting delivery person and
	/// `delivered` completes its delivery; every other target is a plain
	/// status update.
	#[instrument(skip(self, actor), fields(actor = %actor))]
	pub async fn transition_order(
		&self,
		order_id: u64,
		target: OrderStatus,
		actor: &Actor,
	) -> Result<OrderResponse, MarketplaceError> {
		if OrderStateMachine::is_delivery_edge(target) {
			let DeliveryResponse { order, delivery } = match target {
				OrderStatus::InDelivery => self.deliveries.accept_order(order_id, actor).await?,
				_ => self.deliveries.complete_delivery(order_id, actor).await?,
			};
			return Ok(OrderResponse {
				order,
				delivery: Some(delivery),
			});
		}

		let order = self.orders.transition(order_id, target, actor).await?;
		Ok(OrderResponse {
			order,
			delivery: None,
		})
	}

	/// Assigns a prepared order to the acting delivery person.
	pub async fn accept_order(
		&self,
		order_id: u64,
		actor: &Actor,
	) -> Result<DeliveryResponse, MarketplaceError> {
		self.deliveries.accept_order(order_id, actor).await
	}

	/// Completes the delivery of an order. Idempotent.
	pub async fn complete_delivery(
		&self,
		order_id: u64,
		actor: &Actor,
	) -> Result<DeliveryResponse, MarketplaceError> {
		self.deliveries.complete_delivery(order_id, actor).await
	}

	/// Prepared orders waiting for a delivery person.
	pub async fn available_orders(
		&self,
		page: u32,
		per_page: u32,
	) -> Result<Page<Order>, MarketplaceError> {
		self.deliveries.available_orders(page, per_page).await
	}

	/// Deliveries assigned to a delivery person.
	pub async fn deliveries_for(
		&self,
		delivery_person_id: u64,
	) -> Result<Vec<DeliveryResponse>, MarketplaceError> {
		self.deliveries.deliveries_for(delivery_person_id).await
	}

	/// Delivery count and commission earned by a delivery person.
	pub async fn delivery_stats(
		&self,
		delivery_person_id: u64,
	) -> Result<DeliveryStats, MarketplaceError> {
		self.deliveries.stats(delivery_person_id).await
	}

	/// Returns a reference to the marketplace configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the storage service.
	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::builder::tests::test_engine;
	use marketplace_types::{
		CustomerContact, DeliveryInfo, DeliveryStatus, OrderLineRequest,
	};
	use rust_decimal::Decimal;
	use std::str::FromStr;

	const CUSTOMER: Actor = Actor::Customer { id: 1 };
	const PROVIDER: Actor = Actor::Provider { id: 10 };
	const RIDER_A: Actor = Actor::DeliveryPerson { id: 7 };
	const RIDER_B: Actor = Actor::DeliveryPerson { id: 8 };

	fn dec(s: &str) -> Decimal {
		Decimal::from_str(s).unwrap()
	}

	fn request(lines: &[(u64, i64)]) -> CreateOrderRequest {
		CreateOrderRequest {
			contact: CustomerContact {
				name: "Amina".into(),
				email: Some("amina@example.com".into()),
				phone: None,
			},
			delivery_info: DeliveryInfo {
				street: "1 rue Didouche".into(),
				city: "Alger".into(),
				region: Some("Alger".into()),
				postal_code: "16000".into(),
				notes: None,
			},
			lines: lines
				.iter()
				.map(|&(product_id, quantity)| OrderLineRequest {
					product_id,
					quantity,
				})
				.collect(),
		}
	}

	async fn prepared_order(engine: &MarketplaceEngine) -> Order {
		let order = engine
			.create_order(&CUSTOMER, request(&[(100, 2), (101, 1)]))
			.await
			.unwrap();
		engine
			.transition_order(order.id, OrderStatus::InProgress, &PROVIDER)
			.await
			.unwrap();
		engine
			.transition_order(order.id, OrderStatus::Prepared, &PROVIDER)
			.await
			.unwrap()
			.order
	}

	#[tokio::test]
	async fn test_create_order_computes_totals() {
		let engine = test_engine();
		let order = engine
			.create_order(&CUSTOMER, request(&[(100, 2), (101, 1)]))
			.await
			.unwrap();

		assert_eq!(order.totals.subtotal, dec("13.00"));
		assert_eq!(order.totals.total, dec("15.00"));
		assert_eq!(order.status, OrderStatus::Pending);
		assert_eq!(order.customer_id, 1);
		assert_eq!(order.lines.len(), 2);
		assert_eq!(order.lines[0].unit_price, dec("5.00"));
		assert_eq!(order.lines[0].provider_id, 10);
	}

	#[tokio::test]
	async fn test_create_order_rejections() {
		let engine = test_engine();

		assert!(matches!(
			engine.create_order(&CUSTOMER, request(&[])).await,
			Err(MarketplaceError::Validation(_))
		));
		assert!(matches!(
			engine.create_order(&CUSTOMER, request(&[(100, 0)])).await,
			Err(MarketplaceError::Validation(_))
		));
		assert!(matches!(
			engine.create_order(&CUSTOMER, request(&[(999, 1)])).await,
			Err(MarketplaceError::NotFound(_))
		));
		assert!(matches!(
			engine.create_order(&CUSTOMER, request(&[(102, 1)])).await,
			Err(MarketplaceError::Validation(fields)) if fields[0].field == "lines[0].product_id"
		));
		assert!(matches!(
			engine.create_order(&PROVIDER, request(&[(100, 1)])).await,
			Err(MarketplaceError::Forbidden(_))
		));

		let nothing = engine.list_orders(&OrderQuery::new()).await.unwrap();
		assert_eq!(nothing.total, 0);
	}

	#[tokio::test]
	async fn test_full_lifecycle() {
		let engine = test_engine();
		let order = prepared_order(&engine).await;
		assert_eq!(order.status, OrderStatus::Prepared);

		let accepted = engine.accept_order(order.id, &RIDER_A).await.unwrap();
		assert_eq!(accepted.order.status, OrderStatus::InDelivery);
		assert_eq!(accepted.delivery.status, DeliveryStatus::InProgress);
		assert_eq!(accepted.delivery.delivery_person_id, Some(7));

		assert!(matches!(
			engine.accept_order(order.id, &RIDER_B).await,
			Err(MarketplaceError::Conflict(_))
		));
		assert!(matches!(
			engine.complete_delivery(order.id, &RIDER_B).await,
			Err(MarketplaceError::Forbidden(_))
		));

		let completed = engine.complete_delivery(order.id, &RIDER_A).await.unwrap();
		assert_eq!(completed.order.status, OrderStatus::Delivered);
		assert_eq!(completed.delivery.status, DeliveryStatus::Delivered);

		let again = engine.complete_delivery(order.id, &RIDER_A).await.unwrap();
		assert_eq!(again, completed);

		let stats = engine.delivery_stats(7).await.unwrap();
		assert_eq!(stats.completed_deliveries, 1);
		assert_eq!(stats.active_deliveries, 0);
		assert_eq!(stats.total_earnings, dec("1.50"));

		let fetched = engine.get_order(order.id).await.unwrap();
		assert_eq!(fetched.delivery, Some(completed.delivery.clone()));

		assert!(matches!(
			engine
				.transition_order(order.id, OrderStatus::Cancelled, &CUSTOMER)
				.await,
			Err(MarketplaceError::InvalidTransition {
				from: OrderStatus::Delivered,
				to: OrderStatus::Cancelled
			})
		));

		let history = engine.deliveries_for(7).await.unwrap();
		assert_eq!(history.len(), 1);
		assert_eq!(history[0].order.id, order.id);
	}

	#[tokio::test]
	async fn test_repeated_completion_requires_assignee_or_admin() {
		let engine = test_engine();
		let order_id = prepared_order(&engine).await.id;
		engine.accept_order(order_id, &RIDER_A).await.unwrap();
		let completed = engine.complete_delivery(order_id, &RIDER_A).await.unwrap();

		for outsider in [RIDER_B, CUSTOMER, PROVIDER] {
			assert!(
				matches!(
					engine.complete_delivery(order_id, &outsider).await,
					Err(MarketplaceError::Forbidden(_))
				),
				"{}",
				outsider
			);
			assert!(matches!(
				engine
					.transition_order(order_id, OrderStatus::Delivered, &outsider)
					.await,
				Err(MarketplaceError::Forbidden(_))
			));
		}

		let by_admin = engine
			.complete_delivery(order_id, &Actor::Admin { id: 1 })
			.await
			.unwrap();
		assert_eq!(by_admin, completed);
	}

	#[tokio::test]
	async fn test_generic_transition_routes_delivery_edges() {
		let engine = test_engine();
		let order = prepared_order(&engine).await;

		let available = engine.available_orders(1, 20).await.unwrap();
		assert_eq!(available.items.len(), 1);

		let accepted = engine
			.transition_order(order.id, OrderStatus::InDelivery, &RIDER_A)
			.await
			.unwrap();
		assert_eq!(accepted.order.status, OrderStatus::InDelivery);
		assert!(accepted.delivery.is_some());
		assert!(engine.available_orders(1, 20).await.unwrap().items.is_empty());

		let delivered = engine
			.transition_order(order.id, OrderStatus::Delivered, &Actor::Admin { id: 1 })
			.await
			.unwrap();
		assert_eq!(delivered.order.status, OrderStatus::Delivered);
		assert_eq!(
			delivered.delivery.map(|d| d.status),
			Some(DeliveryStatus::Delivered)
		);
	}

	#[tokio::test]
	async fn test_accept_requires_prepared_order() {
		let engine = test_engine();
		let order = engine
			.create_order(&CUSTOMER, request(&[(100, 1)]))
			.await
			.unwrap();

		assert!(matches!(
			engine.accept_order(order.id, &RIDER_A).await,
			Err(MarketplaceError::InvalidTransition {
				from: OrderStatus::Pending,
				..
			})
		));
		assert!(matches!(
			engine.accept_order(404, &RIDER_A).await,
			Err(MarketplaceError::NotFound(_))
		));
		assert!(matches!(
			engine.complete_delivery(order.id, &RIDER_A).await,
			Err(MarketplaceError::InvalidTransition { .. })
		));
	}

	#[tokio::test]
	async fn test_cancellation_paths() {
		let engine = test_engine();
		let order = engine
			.create_order(&CUSTOMER, request(&[(100, 1)]))
			.await
			.unwrap();

		assert!(matches!(
			engine
				.transition_order(order.id, OrderStatus::Cancelled, &Actor::Customer { id: 2 })
				.await,
			Err(MarketplaceError::Forbidden(_))
		));
		let cancelled = engine
			.transition_order(order.id, OrderStatus::Cancelled, &CUSTOMER)
			.await
			.unwrap();
		assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
		assert!(matches!(
			engine
				.transition_order(order.id, OrderStatus::InProgress, &PROVIDER)
				.await,
			Err(MarketplaceError::InvalidTransition { .. })
		));
	}

	#[tokio::test]
	async fn test_list_filters() {
		let engine = test_engine();
		engine
			.create_order(&CUSTOMER, request(&[(100, 1)]))
			.await
			.unwrap();
		engine
			.create_order(&Actor::Customer { id: 2 }, request(&[(200, 1)]))
			.await
			.unwrap();

		let mine = engine
			.list_orders(&OrderQuery::new().customer(1))
			.await
			.unwrap();
		assert_eq!(mine.total, 1);

		let pharmacy = engine
			.list_orders(&OrderQuery::new().provider(20))
			.await
			.unwrap();
		assert_eq!(pharmacy.items[0].customer_id, 2);

		let pending = engine
			.list_orders(&OrderQuery::new().status(OrderStatus::Pending))
			.await
			.unwrap();
		assert_eq!(pending.total, 2);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_accept_has_exactly_one_winner() {
		let engine = Arc::new(test_engine());
		let order_id = prepared_order(&engine).await.id;

		let first = tokio::spawn({
			let engine = engine.clone();
			async move { engine.accept_order(order_id, &RIDER_A).await }
		});
		let second = tokio::spawn({
			let engine = engine.clone();
			async move { engine.accept_order(order_id, &RIDER_B).await }
		});
		let results = [first.await.unwrap(), second.await.unwrap()];

		let winners = results.iter().filter(|r| r.is_ok()).count();
		assert_eq!(winners, 1);
		assert!(results
			.iter()
			.any(|r| matches!(r, Err(MarketplaceError::Conflict(_)))));

		let fetched = engine.get_order(order_id).await.unwrap();
		assert_eq!(fetched.order.status, OrderStatus::InDelivery);
		assert!(fetched.delivery.is_some());
		let assignments = engine.deliveries_for(7).await.unwrap().len()
			+ engine.deliveries_for(8).await.unwrap().len();
		assert_eq!(assignments, 1);
	}

	#[tokio::test]
	async fn test_concurrent_status_updates_have_one_winner() {
		let engine = Arc::new(test_engine());
		let order_id = engine
			.create_order(&CUSTOMER, request(&[(100, 1)]))
			.await
			.unwrap()
			.id;
		engine
			.transition_order(order_id, OrderStatus::InProgress, &PROVIDER)
			.await
			.unwrap();

		let cancel = tokio::spawn({
			let engine = engine.clone();
			async move {
				engine
					.transition_order(order_id, OrderStatus::Cancelled, &PROVIDER)
					.await
			}
		});
		let prepare = tokio::spawn({
			let engine = engine.clone();
			async move {
				engine
					.transition_order(order_id, OrderStatus::Prepared, &PROVIDER)
					.await
			}
		});
		let results = [cancel.await.unwrap(), prepare.await.unwrap()];

		// Whichever lands second no longer finds the order in_progress
		assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
		let final_status = engine.get_order(order_id).await.unwrap().order.status;
		assert!(matches!(
			final_status,
			OrderStatus::Cancelled | OrderStatus::Prepared
		));
	}
}
