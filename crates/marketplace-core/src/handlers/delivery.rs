//! Delivery handler for assigning prepared orders and completing deliveries.
//!
//! Assignment creates the delivery record and moves the order to
//! `in_delivery` in one write, guarded by a per-order uniqueness constraint:
//! when two delivery persons race for the same order, exactly one wins and
//! the other gets a conflict. Completion is idempotent.

use crate::error::{MarketplaceError, StorageResultExt};
use crate::pricing::Pricing;
use crate::state::OrderStateMachine;
use marketplace_storage::{OrderRepository, StorageError};
use marketplace_types::{
	Actor, Delivery, DeliveryResponse, DeliveryStats, DeliveryStatus, Order, OrderQuery,
	OrderStatus, Page,
};
use rust_decimal::Decimal;
use tracing::instrument;

/// Handler for delivery assignment, completion and delivery-person views.
pub struct DeliveryHandler {
	repository: OrderRepository,
	pricing: Pricing,
}

impl DeliveryHandler {
	pub fn new(repository: OrderRepository, pricing: Pricing) -> Self {
		Self {
			repository,
			pricing,
		}
	}

	async fn load_order(&self, order_id: u64) -> Result<Order, MarketplaceError> {
		self.repository
			.get_order(order_id)
			.await
			.or_not_found(|| format!("order {}", order_id))
	}

	/// Assigns a prepared order to the delivery person performing the request.
	#[instrument(skip_all, fields(order_id = order_id, actor = %actor))]
	pub async fn accept_order(
		&self,
		order_id: u64,
		actor: &Actor,
	) -> Result<DeliveryResponse, MarketplaceError> {
		let order = self.load_order(order_id).await?;
		match order.status {
			OrderStatus::Prepared => {},
			OrderStatus::InDelivery | OrderStatus::Delivered => {
				tracing::warn!(status = %order.status, "Order already assigned");
				return Err(MarketplaceError::Conflict(format!(
					"order {} has already been accepted",
					order_id
				)));
			},
			from => {
				return Err(MarketplaceError::InvalidTransition {
					from,
					to: OrderStatus::InDelivery,
				})
			},
		}
		OrderStateMachine::check_transition(&order, OrderStatus::InDelivery, actor, None)?;

		let (order, delivery) = match self
			.repository
			.create_delivery_and_transition(order_id, actor.id())
			.await
		{
			Err(StorageError::Conflict(message)) => {
				tracing::warn!(%message, "Lost assignment race");
				return Err(MarketplaceError::Conflict(message));
			},
			other => other.or_not_found(|| format!("order {}", order_id))?,
		};

		tracing::info!(delivery_id = delivery.id, "Order accepted for delivery");
		Ok(DeliveryResponse { order, delivery })
	}

	/// Completes the delivery of an order.
	///
	/// Completing an already delivered order returns its current state.
	#[instrument(skip_all, fields(order_id = order_id, actor = %actor))]
	pub async fn complete_delivery(
		&self,
		order_id: u64,
		actor: &Actor,
	) -> Result<DeliveryResponse, MarketplaceError> {
		let order = self.load_order(order_id).await?;
		let delivery = self.repository.find_delivery_by_order(order_id).await?;

		if order.status == OrderStatus::Delivered {
			if let Some(delivery) = delivery {
				if !OrderStateMachine::may_complete(actor, Some(&delivery)) {
					tracing::warn!("Rejected repeated delivery completion");
					return Err(MarketplaceError::Forbidden(format!(
						"{} may not complete the delivery of order {}",
						actor, order_id
					)));
				}
				tracing::debug!("Delivery already completed");
				return Ok(DeliveryResponse { order, delivery });
			}
		}
		OrderStateMachine::check_transition(&order, OrderStatus::Delivered, actor, delivery.as_ref())
			.inspect_err(|e| tracing::warn!(error = %e, "Rejected delivery completion"))?;
		if delivery.is_none() {
			return Err(MarketplaceError::NotFound(format!(
				"delivery for order {}",
				order_id
			)));
		}

		let (order, delivery) = match self
			.repository
			.complete_delivery_and_transition(order_id)
			.await
		{
			Err(StorageError::Conflict(message)) => {
				tracing::warn!(%message, "Delivery changed concurrently");
				return Err(MarketplaceError::Conflict(message));
			},
			other => other.or_not_found(|| format!("delivery for order {}", order_id))?,
		};

		tracing::info!(delivery_id = delivery.id, "Delivery completed");
		Ok(DeliveryResponse { order, delivery })
	}

	/// Orders waiting for a delivery person.
	pub async fn available_orders(
		&self,
		page: u32,
		per_page: u32,
	) -> Result<Page<Order>, MarketplaceError> {
		let query = OrderQuery::new()
			.status(OrderStatus::Prepared)
			.paginate(page, per_page);
		Ok(self.repository.list_orders(&query).await?)
	}

	/// Deliveries assigned to a delivery person, each with its order.
	pub async fn deliveries_for(
		&self,
		delivery_person_id: u64,
	) -> Result<Vec<DeliveryResponse>, MarketplaceError> {
		let deliveries = self
			.repository
			.deliveries_for_person(delivery_person_id)
			.await?;

		let mut responses = Vec::with_capacity(deliveries.len());
		for delivery in deliveries {
			let order = self.load_order(delivery.order_id).await?;
			responses.push(DeliveryResponse { order, delivery });
		}
		Ok(responses)
	}

	/// Completed and active deliveries of a delivery person, with the
	/// commission earned on completed ones.
	pub async fn stats(&self, delivery_person_id: u64) -> Result<DeliveryStats, MarketplaceError> {
		let deliveries: Vec<Delivery> = self
			.repository
			.deliveries_for_person(delivery_person_id)
			.await?;

		let mut completed_deliveries = 0;
		let mut active_deliveries = 0;
		let mut total_earnings = Decimal::ZERO;
		for delivery in &deliveries {
			match delivery.status {
				DeliveryStatus::InProgress => active_deliveries += 1,
				DeliveryStatus::Delivered => {
					let order = self.load_order(delivery.order_id).await?;
					completed_deliveries += 1;
					total_earnings += self.pricing.commission(order.totals.total);
				},
			}
		}

		Ok(DeliveryStats {
			delivery_person_id,
			completed_deliveries,
			active_deliveries,
			commission_rate: self.pricing.commission_rate,
			total_earnings,
		})
	}
}
