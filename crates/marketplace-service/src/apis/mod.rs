//! HTTP handlers of the marketplace API.
//!
//! Handlers resolve the acting identity from request headers, normalize
//! status strings and delegate to the engine. Engine failures are logged
//! here and converted to [`APIError`] responses.

use marketplace_core::MarketplaceError;
use marketplace_types::APIError;

pub mod actor;
pub mod delivery;
pub mod order;
pub mod status;

/// Logs a failed operation and converts the error for the response.
fn rejected(operation: &'static str) -> impl FnOnce(MarketplaceError) -> APIError {
	move |error| {
		tracing::warn!(operation, error = %error, "Request failed");
		APIError::from(error)
	}
}
