//! Parsing of order status strings received over HTTP.
//!
//! Older clients still send the French vocabulary (`en attente`, `livrée`,
//! ...). Those spellings are accepted here and mapped onto [`OrderStatus`];
//! responses only ever carry the canonical names.

use marketplace_types::{APIError, OrderStatus};

/// Parses a canonical or legacy status name, ignoring case and treating
/// spaces like underscores.
pub fn parse_status(raw: &str) -> Result<OrderStatus, APIError> {
	let normalized = raw.trim().to_lowercase().replace(' ', "_");
	if let Ok(status) = normalized.parse() {
		return Ok(status);
	}

	let status = match normalized.as_str() {
		"en_attente" => OrderStatus::Pending,
		"en_cours" | "en_préparation" | "en_preparation" => OrderStatus::InProgress,
		"préparée" | "preparee" | "prepare" => OrderStatus::Prepared,
		"en_livraison" => OrderStatus::InDelivery,
		"livrée" | "livree" | "livre" => OrderStatus::Delivered,
		"annulée" | "annulee" | "annule" => OrderStatus::Cancelled,
		_ => {
			return Err(APIError::BadRequest {
				error_type: "UNKNOWN_STATUS".to_string(),
				message: format!("Unknown order status: {}", raw),
				details: Some(serde_json::json!({
					"accepted": OrderStatus::all().map(|s| s.as_str()).collect::<Vec<_>>()
				})),
			})
		},
	};
	tracing::debug!(legacy = raw, status = %status, "Normalized legacy status");
	Ok(status)
}
