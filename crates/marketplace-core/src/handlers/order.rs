//! Order handler for creating orders and moving them through preparation.
//!
//! Creation validates the request, snapshots product prices from the catalog
//! and persists the order with its lines in one write. Status updates check
//! the state machine against the order as read, and the write only lands if
//! the order is still in that state.

use crate::error::{MarketplaceError, StorageResultExt};
use crate::pricing::Pricing;
use crate::state::OrderStateMachine;
use marketplace_catalog::CatalogService;
use marketplace_storage::{OrderRepository, StorageError};
use marketplace_types::{
	Actor, CreateOrderRequest, FieldError, Order, OrderDraft, OrderLine, OrderQuery, OrderStatus,
	Page,
};
use std::sync::Arc;
use tracing::instrument;

/// Collects field errors of a create request that need no catalog lookup.
fn validate_request(request: &CreateOrderRequest) -> Vec<FieldError> {
	let mut errors = Vec::new();

	if request.contact.name.trim().is_empty() {
		errors.push(FieldError::new("contact.name", "is required"));
	}

	let address = &request.delivery_info;
	for (field, value) in [
		("delivery_info.street", &address.street),
		("delivery_info.city", &address.city),
		("delivery_info.postal_code", &address.postal_code),
	] {
		if value.trim().is_empty() {
			errors.push(FieldError::new(field, "is required"));
		}
	}

	if request.lines.is_empty() {
		errors.push(FieldError::new("lines", "at least one line is required"));
	}
	for (i, line) in request.lines.iter().enumerate() {
		if line.quantity <= 0 {
			errors.push(FieldError::new(
				format!("lines[{}].quantity", i),
				"must be a positive integer",
			));
		} else if u32::try_from(line.quantity).is_err() {
			errors.push(FieldError::new(
				format!("lines[{}].quantity", i),
				"is too large",
			));
		}
	}

	errors
}

/// Handler for order creation, reads and preparation-side transitions.
pub struct OrderHandler {
	repository: OrderRepository,
	catalog: Arc<CatalogService>,
	pricing: Pricing,
}

impl OrderHandler {
	pub fn new(repository: OrderRepository, catalog: Arc<CatalogService>, pricing: Pricing) -> Self {
		Self {
			repository,
			catalog,
			pricing,
		}
	}

	/// Creates a `pending` order for the customer performing the request.
	#[instrument(skip_all, fields(actor = %actor, lines = request.lines.len()))]
	pub async fn create(
		&self,
		actor: &Actor,
		request: CreateOrderRequest,
	) -> Result<Order, MarketplaceError> {
		let Actor::Customer { id: customer_id } = *actor else {
			return Err(MarketplaceError::Forbidden(format!(
				"{} may not place orders",
				actor
			)));
		};

		let errors = validate_request(&request);
		if !errors.is_empty() {
			tracing::debug!(errors = errors.len(), "Rejected order request");
			return Err(MarketplaceError::Validation(errors));
		}

		let mut lines = Vec::with_capacity(request.lines.len());
		let mut unavailable = Vec::new();
		for (i, requested) in request.lines.iter().enumerate() {
			let product = self.catalog.get_product(requested.product_id).await?;
			if !product.available {
				unavailable.push(FieldError::new(
					format!("lines[{}].product_id", i),
					format!("product {} is unavailable", product.id),
				));
				continue;
			}
			let store = self.catalog.get_store(product.store_id).await?;
			lines.push(OrderLine {
				product_id: product.id,
				product_name: product.name,
				store_id: store.id,
				provider_id: store.provider_id,
				quantity: u32::try_from(requested.quantity).map_err(|_| {
					MarketplaceError::invalid(format!("lines[{}].quantity", i), "is too large")
				})?,
				unit_price: product.price,
			});
		}
		if !unavailable.is_empty() {
			return Err(MarketplaceError::Validation(unavailable));
		}

		let totals = self.pricing.totals(&lines);
		let order = self
			.repository
			.create_order_with_lines(OrderDraft {
				customer_id,
				contact: request.contact,
				delivery_info: request.delivery_info,
				lines,
				totals,
			})
			.await?;

		tracing::info!(order_id = order.id, total = %order.totals.total, "Order created");
		Ok(order)
	}

	/// Loads an order.
	pub async fn get(&self, order_id: u64) -> Result<Order, MarketplaceError> {
		self.repository
			.get_order(order_id)
			.await
			.or_not_found(|| format!("order {}", order_id))
	}

	/// Lists orders matching a query.
	pub async fn list(&self, query: &OrderQuery) -> Result<Page<Order>, MarketplaceError> {
		Ok(self.repository.list_orders(query).await?)
	}

	/// Applies a preparation-side transition (provider progress or
	/// cancellation).
	///
	/// Delivery edges are rejected here; they are taken by
	/// [`DeliveryHandler`](crate::handlers::DeliveryHandler) so the delivery
	/// record and the order status always change together.
	#[instrument(skip_all, fields(order_id = order_id, actor = %actor, target = %target))]
	pub async fn transition(
		&self,
		order_id: u64,
		target: OrderStatus,
		actor: &Actor,
	) -> Result<Order, MarketplaceError> {
		let order = self.get(order_id).await?;
		OrderStateMachine::check_transition(&order, target, actor, None).inspect_err(|e| {
			tracing::warn!(error = %e, "Rejected order transition");
		})?;
		if OrderStateMachine::is_delivery_edge(target) {
			return Err(MarketplaceError::Conflict(format!(
				"moving order {} to {} requires a delivery assignment",
				order_id, target
			)));
		}

		let updated = match self
			.repository
			.transition_order_status(order_id, order.status, target)
			.await
		{
			Err(StorageError::Conflict(message)) => {
				tracing::warn!(%message, "Order changed concurrently");
				return Err(MarketplaceError::Conflict(message));
			},
			other => other.or_not_found(|| format!("order {}", order_id))?,
		};

		tracing::info!(from = %order.status, to = %updated.status, "Order transitioned");
		Ok(updated)
	}
}
