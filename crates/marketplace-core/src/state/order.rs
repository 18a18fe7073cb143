//! Order state machine implementation.
//!
//! Orders move through `pending -> in_progress -> prepared -> in_delivery ->
//! delivered`, and may be cancelled while `pending` or `in_progress`. Every
//! other edge is rejected. A legal edge is additionally restricted to the
//! actors allowed to take it.

use marketplace_types::{Actor, Delivery, Order, OrderStatus};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur when checking an order transition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderStateError {
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("{actor} may not move order {order_id} from {from} to {to}")]
	Forbidden {
		actor: Actor,
		order_id: u64,
		from: OrderStatus,
		to: OrderStatus,
	},
}

// Static transition table - each state maps to allowed next states
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::Pending,
		HashSet::from([OrderStatus::InProgress, OrderStatus::Cancelled]),
	);
	m.insert(
		OrderStatus::InProgress,
		HashSet::from([OrderStatus::Prepared, OrderStatus::Cancelled]),
	);
	m.insert(OrderStatus::Prepared, HashSet::from([OrderStatus::InDelivery]));
	m.insert(OrderStatus::InDelivery, HashSet::from([OrderStatus::Delivered]));
	m.insert(OrderStatus::Delivered, HashSet::new()); // terminal
	m.insert(OrderStatus::Cancelled, HashSet::new()); // terminal
	m
});

/// Validates order transitions and the actors performing them.
pub struct OrderStateMachine;

impl OrderStateMachine {
	/// Checks if a state transition is in the transition table.
	pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
		TRANSITIONS.get(&from).is_some_and(|set| set.contains(&to))
	}

	/// Statuses reachable in one step from `from`.
	pub fn next_statuses(from: OrderStatus) -> Vec<OrderStatus> {
		OrderStatus::all()
			.filter(|to| Self::is_valid_transition(from, *to))
			.collect()
	}

	/// Returns true for edges that create or complete a delivery record.
	///
	/// These edges are taken by the delivery assignment flow, never by a plain
	/// status update.
	pub fn is_delivery_edge(to: OrderStatus) -> bool {
		matches!(to, OrderStatus::InDelivery | OrderStatus::Delivered)
	}

	/// Checks that `actor` may move `order` to `to`.
	///
	/// The edge itself is validated first, so an illegal edge is reported as
	/// [`OrderStateError::InvalidTransition`] whoever asks. `delivery` is the
	/// order's delivery record, needed to recognise the assigned delivery
	/// person on completion.
	pub fn check_transition(
		order: &Order,
		to: OrderStatus,
		actor: &Actor,
		delivery: Option<&Delivery>,
	) -> Result<(), OrderStateError> {
		let from = order.status;
		if !Self::is_valid_transition(from, to) {
			return Err(OrderStateError::InvalidTransition { from, to });
		}

		if Self::is_authorized(order, to, actor, delivery) {
			Ok(())
		} else {
			Err(OrderStateError::Forbidden {
				actor: *actor,
				order_id: order.id,
				from,
				to,
			})
		}
	}

	/// Returns true if `actor` may complete `delivery`: its assigned delivery
	/// person, or an admin.
	pub fn may_complete(actor: &Actor, delivery: Option<&Delivery>) -> bool {
		match actor {
			Actor::Admin { .. } => true,
			Actor::DeliveryPerson { id } => delivery.is_some_and(|d| d.is_assigned_to(*id)),
			_ => false,
		}
	}

	fn is_authorized(
		order: &Order,
		to: OrderStatus,
		actor: &Actor,
		delivery: Option<&Delivery>,
	) -> bool {
		let owning_provider = matches!(actor, Actor::Provider { id } if order.involves_provider(*id));

		match (order.status, to) {
			(OrderStatus::Pending, OrderStatus::Cancelled) => {
				owning_provider
					|| matches!(actor, Actor::Customer { id } if *id == order.customer_id)
			},
			(OrderStatus::Pending, OrderStatus::InProgress)
			| (OrderStatus::InProgress, OrderStatus::Prepared)
			| (OrderStatus::InProgress, OrderStatus::Cancelled) => owning_provider,
			(OrderStatus::Prepared, OrderStatus::InDelivery) => {
				matches!(actor, Actor::DeliveryPerson { .. })
			},
			(OrderStatus::InDelivery, OrderStatus::Delivered) => Self::may_complete(actor, delivery),
			_ => false,
		}
	}
}
