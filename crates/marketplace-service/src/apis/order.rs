//! Order endpoints: creation, reads, listing and status transitions.

use super::{actor::ActingActor, rejected, status::parse_status};
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
};
use marketplace_types::{
	APIError, CreateOrderRequest, Order, OrderQuery, OrderResponse, Page, TransitionRequest,
	DEFAULT_PER_PAGE,
};
use serde::Deserialize;
use tracing::info;

/// Query string of `GET /api/orders`.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
	pub customer: Option<u64>,
	pub provider: Option<u64>,
	/// Canonical or legacy status name.
	pub status: Option<String>,
	pub page: Option<u32>,
	pub per_page: Option<u32>,
}

impl ListOrdersParams {
	fn into_query(self) -> Result<OrderQuery, APIError> {
		let mut query = OrderQuery::new().paginate(
			self.page.unwrap_or(1),
			self.per_page.unwrap_or(DEFAULT_PER_PAGE),
		);
		if let Some(customer) = self.customer {
			query = query.customer(customer);
		}
		if let Some(provider) = self.provider {
			query = query.provider(provider);
		}
		if let Some(status) = self.status.as_deref() {
			query = query.status(parse_status(status)?);
		}
		Ok(query)
	}
}

/// Handles POST /api/orders.
pub async fn create_order(
	State(state): State<AppState>,
	ActingActor(actor): ActingActor,
	Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), APIError> {
	let order = state
		.engine
		.create_order(&actor, request)
		.await
		.map_err(rejected("create_order"))?;
	info!(order_id = order.id, "Order placed via API");
	Ok((StatusCode::CREATED, Json(order)))
}

/// Handles GET /api/orders/{id}.
pub async fn get_order(
	State(state): State<AppState>,
	Path(order_id): Path<u64>,
) -> Result<Json<OrderResponse>, APIError> {
	state
		.engine
		.get_order(order_id)
		.await
		.map(Json)
		.map_err(rejected("get_order"))
}

/// Handles GET /api/orders.
pub async fn list_orders(
	State(state): State<AppState>,
	Query(params): Query<ListOrdersParams>,
) -> Result<Json<Page<Order>>, APIError> {
	let query = params.into_query()?;
	state
		.engine
		.list_orders(&query)
		.await
		.map(Json)
		.map_err(rejected("list_orders"))
}

/// Handles POST /api/orders/{id}/transitions.
pub async fn transition_order(
	State(state): State<AppState>,
	Path(order_id): Path<u64>,
	ActingActor(actor): ActingActor,
	Json(request): Json<TransitionRequest>,
) -> Result<Json<OrderResponse>, APIError> {
	let target = parse_status(&request.status)?;
	state
		.engine
		.transition_order(order_id, target, &actor)
		.await
		.map(Json)
		.map_err(rejected("transition_order"))
}
