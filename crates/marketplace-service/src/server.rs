//! HTTP server for the marketplace API.
//!
//! Builds the axum router over a shared [`MarketplaceEngine`] and serves it on
//! the configured address. All endpoints live under `/api` except `/health`.

use crate::apis;
use axum::{
	extract::{DefaultBodyLimit, State},
	http::{HeaderValue, Method},
	response::Json,
	routing::{get, post},
	Router,
};
use marketplace_config::ApiConfig;
use marketplace_core::MarketplaceEngine;
use marketplace_types::HealthResponse;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{Any, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Engine processing every request.
	pub engine: Arc<MarketplaceEngine>,
}

/// CORS policy from configuration; permissive when none is configured.
fn cors_layer(api_config: &ApiConfig) -> CorsLayer {
	let Some(cors) = &api_config.cors else {
		return CorsLayer::permissive();
	};

	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match origin.parse() {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!(%origin, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();

	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods([Method::GET, Method::POST])
		.allow_headers(Any)
}

/// Builds the API router.
pub fn router(engine: Arc<MarketplaceEngine>, api_config: &ApiConfig) -> Router {
	let api = Router::new()
		.route(
			"/orders",
			post(apis::order::create_order).get(apis::order::list_orders),
		)
		.route("/orders/available", get(apis::delivery::available_orders))
		.route("/orders/{id}", get(apis::order::get_order))
		.route(
			"/orders/{id}/transitions",
			post(apis::order::transition_order),
		)
		.route("/orders/{id}/accept", post(apis::delivery::accept_order))
		.route(
			"/orders/{id}/complete",
			post(apis::delivery::complete_delivery),
		)
		.route(
			"/delivery-persons/{id}/stats",
			get(apis::delivery::delivery_stats),
		)
		.route(
			"/delivery-persons/{id}/deliveries",
			get(apis::delivery::deliveries),
		);

	Router::new()
		.nest("/api", api)
		.route("/health", get(health))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors_layer(api_config))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { engine })
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<MarketplaceEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Marketplace API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles GET /health.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok".to_string(),
		marketplace_id: state.engine.config().marketplace.id.clone(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::apis::actor::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
	use crate::factory_registry::build_marketplace_from_config;
	use axum::{
		body::Body,
		http::{Request, StatusCode},
	};
	use marketplace_config::Config;
	use rust_decimal::Decimal;
	use serde_json::{json, Value};
	use tower::ServiceExt;

	const TEST_CONFIG: &str = r#"
[marketplace]
id = "api-test"

[pricing]
tax_rate = "0"
delivery_fee = "2.00"
commission_rate = "0.10"

[storage]
primary = "memory"
[storage.implementations.memory]

[catalog]
primary = "static"
[catalog.implementations.static]

[[catalog.implementations.static.stores]]
id = 1
provider_id = 10
name = "Chez Paul"
vertical = "restaurant"

[[catalog.implementations.static.products]]
id = 100
store_id = 1
name = "Couscous"
price = "5.00"

[[catalog.implementations.static.products]]
id = 101
store_id = 1
name = "Chorba"
price = "3.00"

[api]
enabled = true
"#;

	fn app() -> Router {
		let config: Config = TEST_CONFIG.parse().unwrap();
		let api_config = config.api.clone().unwrap();
		let engine = build_marketplace_from_config(config).unwrap();
		router(Arc::new(engine), &api_config)
	}

	async fn send(
		app: &Router,
		method: &str,
		uri: &str,
		actor: Option<(&str, u64)>,
		body: Option<Value>,
	) -> (StatusCode, Value) {
		let mut request = Request::builder().method(method).uri(uri);
		if let Some((role, id)) = actor {
			request = request
				.header(ACTOR_ROLE_HEADER, role)
				.header(ACTOR_ID_HEADER, id.to_string());
		}
		let request = match body {
			Some(body) => request
				.header("content-type", "application/json")
				.body(Body::from(body.to_string())),
			None => request.body(Body::empty()),
		}
		.unwrap();

		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, value)
	}

	fn order_body() -> Value {
		json!({
			"contact": { "name": "Amina", "email": "amina@example.com" },
			"delivery_info": {
				"street": "1 rue Didouche",
				"city": "Alger",
				"postal_code": "16000"
			},
			"lines": [
				{ "product_id": 100, "quantity": 2 },
				{ "product_id": 101, "quantity": 1 }
			]
		})
	}

	fn dec(value: &Value) -> Decimal {
		value.as_str().unwrap().parse().unwrap()
	}

	#[tokio::test]
	async fn test_health() {
		let (status, body) = send(&app(), "GET", "/health", None, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["marketplace_id"], "api-test");
	}

	#[tokio::test]
	async fn test_order_lifecycle_over_http() {
		let app = app();

		let (status, order) = send(
			&app,
			"POST",
			"/api/orders",
			Some(("customer", 1)),
			Some(order_body()),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(order["status"], "pending");
		assert_eq!(dec(&order["totals"]["total"]), Decimal::new(1500, 2));
		let id = order["id"].as_u64().unwrap();

		// Legacy spellings are accepted, canonical names returned
		for legacy in ["en cours", "préparée"] {
			let (status, _) = send(
				&app,
				"POST",
				&format!("/api/orders/{}/transitions", id),
				Some(("provider", 10)),
				Some(json!({ "status": legacy })),
			)
			.await;
			assert_eq!(status, StatusCode::OK);
		}
		let (_, fetched) = send(&app, "GET", &format!("/api/orders/{}", id), None, None).await;
		assert_eq!(fetched["order"]["status"], "prepared");
		assert!(fetched.get("delivery").is_none());

		let (_, available) = send(&app, "GET", "/api/orders/available", None, None).await;
		assert_eq!(available["total"], 1);

		let accept = format!("/api/orders/{}/accept", id);
		let (status, accepted) = send(&app, "POST", &accept, Some(("delivery_person", 7)), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(accepted["order"]["status"], "in_delivery");
		assert_eq!(accepted["delivery"]["status"], "in_progress");

		let (status, body) = send(&app, "POST", &accept, Some(("delivery_person", 8)), None).await;
		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"], "CONFLICT");

		let complete = format!("/api/orders/{}/complete", id);
		let (status, first) = send(&app, "POST", &complete, Some(("delivery_person", 7)), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(first["order"]["status"], "delivered");
		let (status, second) = send(&app, "POST", &complete, Some(("delivery_person", 7)), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(first, second);

		let (status, stats) = send(&app, "GET", "/api/delivery-persons/7/stats", None, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(stats["completed_deliveries"], 1);
		assert_eq!(dec(&stats["total_earnings"]), Decimal::new(150, 2));

		let (_, deliveries) =
			send(&app, "GET", "/api/delivery-persons/7/deliveries", None, None).await;
		assert_eq!(deliveries.as_array().unwrap().len(), 1);

		let (status, body) = send(
			&app,
			"POST",
			&format!("/api/orders/{}/transitions", id),
			Some(("customer", 1)),
			Some(json!({ "status": "annulée" })),
		)
		.await;
		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"], "INVALID_TRANSITION");
		assert_eq!(body["details"], json!({ "from": "delivered", "to": "cancelled" }));
	}

	#[tokio::test]
	async fn test_error_statuses() {
		let app = app();

		let (status, body) = send(&app, "POST", "/api/orders", None, Some(order_body())).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "MISSING_ACTOR");

		let mut empty = order_body();
		empty["lines"] = json!([]);
		let (status, body) =
			send(&app, "POST", "/api/orders", Some(("customer", 1)), Some(empty)).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["details"][0]["field"], "lines");

		let (status, _) = send(
			&app,
			"POST",
			"/api/orders",
			Some(("provider", 10)),
			Some(order_body()),
		)
		.await;
		assert_eq!(status, StatusCode::FORBIDDEN);

		let (status, _) = send(&app, "GET", "/api/orders/404", None, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		let (_, order) = send(
			&app,
			"POST",
			"/api/orders",
			Some(("customer", 1)),
			Some(order_body()),
		)
		.await;
		let transitions = format!("/api/orders/{}/transitions", order["id"]);

		let (status, body) = send(
			&app,
			"POST",
			&transitions,
			Some(("provider", 10)),
			Some(json!({ "status": "shipped" })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "UNKNOWN_STATUS");

		let (status, _) = send(
			&app,
			"POST",
			&transitions,
			Some(("provider", 20)),
			Some(json!({ "status": "in_progress" })),
		)
		.await;
		assert_eq!(status, StatusCode::FORBIDDEN);

		let (status, _) = send(
			&app,
			"POST",
			&format!("/api/orders/{}/accept", order["id"]),
			Some(("delivery_person", 7)),
			None,
		)
		.await;
		assert_eq!(status, StatusCode::CONFLICT);
	}

	#[tokio::test]
	async fn test_list_filters() {
		let app = app();
		for customer in [1, 2] {
			send(
				&app,
				"POST",
				"/api/orders",
				Some(("customer", customer)),
				Some(order_body()),
			)
			.await;
		}

		let (status, page) = send(&app, "GET", "/api/orders?customer=2", None, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(page["total"], 1);
		assert_eq!(page["items"][0]["customer_id"], 2);

		let (_, page) = send(&app, "GET", "/api/orders?status=en_attente&per_page=1", None, None).await;
		assert_eq!(page["total"], 2);
		assert_eq!(page["items"].as_array().unwrap().len(), 1);

		let (_, page) = send(&app, "GET", "/api/orders?provider=10&status=delivered", None, None).await;
		assert_eq!(page["total"], 0);
	}
}
