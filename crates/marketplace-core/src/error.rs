//! Error taxonomy surfaced by marketplace operations.

use crate::state::OrderStateError;
use marketplace_catalog::CatalogError;
use marketplace_storage::StorageError;
use marketplace_types::{APIError, FieldError, OrderStatus};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the marketplace engine.
///
/// Nothing is retried or swallowed inside the core; callers decide from the
/// variant whether a retry makes sense (`Conflict`, `Timeout`) or not.
#[derive(Debug, Error)]
pub enum MarketplaceError {
	/// Malformed input, with one entry per offending field.
	#[error("Validation failed: {}", join_fields(.0))]
	Validation(Vec<FieldError>),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Invalid transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	#[error("Forbidden: {0}")]
	Forbidden(String),
	/// Lost a race against a concurrent update; re-read and retry.
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Storage call timed out after {0:?}")]
	Timeout(Duration),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Catalog error: {0}")]
	Catalog(String),
}

fn join_fields(fields: &[FieldError]) -> String {
	fields
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join("; ")
}

impl MarketplaceError {
	/// Single-field validation failure.
	pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
		MarketplaceError::Validation(vec![FieldError::new(field, message)])
	}

	/// Converts a storage error, naming the missing record on `NotFound`.
	pub fn from_storage(error: StorageError, what: impl FnOnce() -> String) -> Self {
		match error {
			StorageError::NotFound => MarketplaceError::NotFound(what()),
			other => other.into(),
		}
	}
}

impl From<StorageError> for MarketplaceError {
	fn from(error: StorageError) -> Self {
		match error {
			StorageError::NotFound => MarketplaceError::NotFound("record".into()),
			StorageError::Conflict(message) => MarketplaceError::Conflict(message),
			StorageError::Timeout(after) => MarketplaceError::Timeout(after),
			other => MarketplaceError::Storage(other.to_string()),
		}
	}
}

impl From<CatalogError> for MarketplaceError {
	fn from(error: CatalogError) -> Self {
		match error {
			CatalogError::ProductNotFound(id) => MarketplaceError::NotFound(format!("product {}", id)),
			CatalogError::StoreNotFound(id) => MarketplaceError::NotFound(format!("store {}", id)),
			other => MarketplaceError::Catalog(other.to_string()),
		}
	}
}

impl From<OrderStateError> for MarketplaceError {
	fn from(error: OrderStateError) -> Self {
		match error {
			OrderStateError::InvalidTransition { from, to } => {
				MarketplaceError::InvalidTransition { from, to }
			},
			forbidden @ OrderStateError::Forbidden { .. } => {
				MarketplaceError::Forbidden(forbidden.to_string())
			},
		}
	}
}

/// Seconds a client should wait before retrying after a storage timeout.
const RETRY_AFTER_SECONDS: u64 = 1;

impl From<MarketplaceError> for APIError {
	fn from(error: MarketplaceError) -> Self {
		let message = error.to_string();
		match error {
			MarketplaceError::Validation(fields) => APIError::BadRequest {
				error_type: "VALIDATION_ERROR".to_string(),
				message,
				details: serde_json::to_value(&fields).ok(),
			},
			MarketplaceError::NotFound(_) => APIError::NotFound {
				error_type: "NOT_FOUND".to_string(),
				message,
			},
			MarketplaceError::InvalidTransition { from, to } => APIError::Conflict {
				error_type: "INVALID_TRANSITION".to_string(),
				message,
				details: Some(serde_json::json!({ "from": from, "to": to })),
			},
			MarketplaceError::Forbidden(_) => APIError::Forbidden {
				error_type: "FORBIDDEN".to_string(),
				message,
			},
			MarketplaceError::Conflict(_) => APIError::Conflict {
				error_type: "CONFLICT".to_string(),
				message,
				details: None,
			},
			MarketplaceError::Timeout(_) => APIError::ServiceUnavailable {
				error_type: "STORAGE_TIMEOUT".to_string(),
				message,
				retry_after: Some(RETRY_AFTER_SECONDS),
			},
			MarketplaceError::Storage(_) => APIError::InternalServerError {
				error_type: "STORAGE_ERROR".to_string(),
				message,
			},
			MarketplaceError::Catalog(_) => APIError::InternalServerError {
				error_type: "CATALOG_ERROR".to_string(),
				message,
			},
		}
	}
}

/// Extension for naming the missing record of a storage lookup.
pub(crate) trait StorageResultExt<T> {
	fn or_not_found(self, what: impl FnOnce() -> String) -> Result<T, MarketplaceError>;
}

impl<T> StorageResultExt<T> for Result<T, StorageError> {
	fn or_not_found(self, what: impl FnOnce() -> String) -> Result<T, MarketplaceError> {
		self.map_err(|e| MarketplaceError::from_storage(e, what))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_storage_errors_keep_their_meaning() {
		assert!(matches!(
			MarketplaceError::from(StorageError::Conflict("lost".into())),
			MarketplaceError::Conflict(_)
		));
		assert!(matches!(
			MarketplaceError::from(StorageError::Timeout(Duration::from_millis(5))),
			MarketplaceError::Timeout(_)
		));
		assert!(matches!(
			MarketplaceError::from(StorageError::Backend("disk".into())),
			MarketplaceError::Storage(_)
		));

		let missing: Result<(), StorageError> = Err(StorageError::NotFound);
		let err = missing.or_not_found(|| "order 4".into()).unwrap_err();
		assert_eq!(err.to_string(), "Not found: order 4");
	}

	#[test]
	fn test_validation_message_lists_fields() {
		let err = MarketplaceError::Validation(vec![
			FieldError::new("lines", "at least one line is required"),
			FieldError::new("contact.name", "is required"),
		]);
		assert_eq!(
			err.to_string(),
			"Validation failed: lines: at least one line is required; contact.name: is required"
		);
	}

	#[test]
	fn test_api_status_mapping() {
		let status = |e: MarketplaceError| APIError::from(e).status_code();
		assert_eq!(status(MarketplaceError::invalid("lines", "required")), 400);
		assert_eq!(status(MarketplaceError::Forbidden("no".into())), 403);
		assert_eq!(status(MarketplaceError::NotFound("order 1".into())), 404);
		assert_eq!(status(MarketplaceError::Conflict("lost".into())), 409);
		assert_eq!(status(MarketplaceError::Storage("disk".into())), 500);
		assert_eq!(status(MarketplaceError::Catalog("down".into())), 500);

		let timeout = APIError::from(MarketplaceError::Timeout(Duration::from_secs(5)));
		assert_eq!(timeout.status_code(), 503);
		assert_eq!(timeout.to_error_response().retry_after, Some(RETRY_AFTER_SECONDS));
	}

	#[test]
	fn test_invalid_transition_details_name_both_states() {
		let body = APIError::from(MarketplaceError::InvalidTransition {
			from: OrderStatus::Delivered,
			to: OrderStatus::Cancelled,
		})
		.to_error_response();
		assert_eq!(body.error, "INVALID_TRANSITION");
		assert_eq!(
			body.details,
			Some(serde_json::json!({ "from": "delivered", "to": "cancelled" }))
		);

		let invalid = APIError::from(MarketplaceError::invalid("lines[0].quantity", "too small"))
			.to_error_response();
		assert_eq!(invalid.details.unwrap()[0]["field"], "lines[0].quantity");
	}
}
