//! API types for the marketplace HTTP API.
//!
//! This module defines the request and response bodies of the order and
//! delivery endpoints, and the error envelope every failing request returns.

use crate::{CustomerContact, Delivery, DeliveryInfo, Order};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One requested line of a new order.
///
/// The quantity is signed so that negative input reaches validation and is
/// reported per field instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineRequest {
	pub product_id: u64,
	pub quantity: i64,
}

/// Request for creating an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
	pub contact: CustomerContact,
	pub delivery_info: DeliveryInfo,
	pub lines: Vec<OrderLineRequest>,
}

/// Request for moving an order to another status.
///
/// The status is kept as free text here and normalized by the API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
	pub status: String,
}

/// An order together with its delivery record, if one exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderResponse {
	pub order: Order,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivery: Option<Delivery>,
}

/// Result of a delivery assignment or completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryResponse {
	pub order: Order,
	pub delivery: Delivery,
}

/// Field-level validation failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
	pub field: String,
	pub message: String,
}

impl FieldError {
	pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			message: message.into(),
		}
	}
}

impl fmt::Display for FieldError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.field, self.message)
	}
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: String,
	pub marketplace_id: String,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed input (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Actor not allowed to perform the operation (403)
	Forbidden { error_type: String, message: String },
	/// Unknown order, product or delivery (404)
	NotFound { error_type: String, message: String },
	/// State machine violation or lost race (409)
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Storage unavailable or timed out (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Forbidden { .. } => 403,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Shorthand for a 400 without details.
	pub fn bad_request(error_type: &str, message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: error_type.to_string(),
			message: message.into(),
			details: None,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details, retry_after) = match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::Conflict {
				error_type,
				message,
				details,
			} => (error_type, message, details.clone(), None),
			APIError::Forbidden {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message, None, None),
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => (error_type, message, None, *retry_after),
		};

		ErrorResponse {
			error: error.clone(),
			message: message.clone(),
			details,
			retry_after,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let error_response = self.to_error_response();
		(status, Json(error_response)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_error_response_carries_details_and_retry() {
		let conflict = APIError::Conflict {
			error_type: "INVALID_TRANSITION".into(),
			message: "nope".into(),
			details: Some(serde_json::json!({ "from": "delivered", "to": "cancelled" })),
		};
		assert_eq!(conflict.status_code(), 409);
		let body = conflict.to_error_response();
		assert_eq!(body.error, "INVALID_TRANSITION");
		assert_eq!(body.details.unwrap()["from"], "delivered");

		let timeout = APIError::ServiceUnavailable {
			error_type: "STORAGE_TIMEOUT".into(),
			message: "slow".into(),
			retry_after: Some(1),
		};
		assert_eq!(timeout.status_code(), 503);
		assert_eq!(timeout.to_error_response().retry_after, Some(1));
	}

	#[test]
	fn test_create_request_accepts_signed_quantities() {
		let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
			"contact": { "name": "Amina", "phone": "0550" },
			"delivery_info": { "street": "1 rue Didouche", "city": "Alger", "postal_code": "16000" },
			"lines": [{ "product_id": 100, "quantity": -1 }]
		}))
		.unwrap();
		assert_eq!(request.lines[0].quantity, -1);
		assert_eq!(request.contact.email, None);
	}
}
