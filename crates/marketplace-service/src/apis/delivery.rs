//! Delivery endpoints used by delivery persons.

use super::{actor::ActingActor, rejected};
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	response::Json,
};
use marketplace_types::{
	APIError, DeliveryResponse, DeliveryStats, Order, Page, DEFAULT_PER_PAGE,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
	pub page: Option<u32>,
	pub per_page: Option<u32>,
}

/// Handles GET /api/orders/available.
pub async fn available_orders(
	State(state): State<AppState>,
	Query(params): Query<PageParams>,
) -> Result<Json<Page<Order>>, APIError> {
	state
		.engine
		.available_orders(
			params.page.unwrap_or(1),
			params.per_page.unwrap_or(DEFAULT_PER_PAGE),
		)
		.await
		.map(Json)
		.map_err(rejected("available_orders"))
}

/// Handles POST /api/orders/{id}/accept.
pub async fn accept_order(
	State(state): State<AppState>,
	Path(order_id): Path<u64>,
	ActingActor(actor): ActingActor,
) -> Result<Json<DeliveryResponse>, APIError> {
	state
		.engine
		.accept_order(order_id, &actor)
		.await
		.map(Json)
		.map_err(rejected("accept_order"))
}

/// Handles POST /api/orders/{id}/complete.
///
/// Repeating the call on a delivered order returns the same body.
pub async fn complete_delivery(
	State(state): State<AppState>,
	Path(order_id): Path<u64>,
	ActingActor(actor): ActingActor,
) -> Result<Json<DeliveryResponse>, APIError> {
	state
		.engine
		.complete_delivery(order_id, &actor)
		.await
		.map(Json)
		.map_err(rejected("complete_delivery"))
}

/// Handles GET /api/delivery-persons/{id}/stats.
pub async fn delivery_stats(
	State(state): State<AppState>,
	Path(delivery_person_id): Path<u64>,
) -> Result<Json<DeliveryStats>, APIError> {
	state
		.engine
		.delivery_stats(delivery_person_id)
		.await
		.map(Json)
		.map_err(rejected("delivery_stats"))
}

/// Handles GET /api/delivery-persons/{id}/deliveries.
pub async fn deliveries(
	State(state): State<AppState>,
	Path(delivery_person_id): Path<u64>,
) -> Result<Json<Vec<DeliveryResponse>>, APIError> {
	state
		.engine
		.deliveries_for(delivery_person_id)
		.await
		.map(Json)
		.map_err(rejected("deliveries"))
}
