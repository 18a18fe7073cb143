//! Resolution of the acting identity.
//!
//! Every mutating request carries `X-Actor-Role` and `X-Actor-Id`, set by the
//! identity layer in front of this service. The pair is turned into a typed
//! [`Actor`] once, here, and passed down unchanged.

use axum::{extract::FromRequestParts, http::request::Parts};
use marketplace_types::{APIError, Actor, ActorRole};

pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Extractor for the actor performing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, APIError> {
	parts
		.headers
		.get(name)
		.ok_or_else(|| APIError::bad_request("MISSING_ACTOR", format!("Missing header {}", name)))?
		.to_str()
		.map_err(|_| APIError::bad_request("INVALID_ACTOR", format!("Header {} is not text", name)))
}

impl<S> FromRequestParts<S> for ActingActor
where
	S: Send + Sync,
{
	type Rejection = APIError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let role: ActorRole = header(parts, ACTOR_ROLE_HEADER)?
			.parse()
			.map_err(|e: String| APIError::bad_request("INVALID_ACTOR", e))?;
		let id: u64 = header(parts, ACTOR_ID_HEADER)?.trim().parse().map_err(|_| {
			APIError::bad_request(
				"INVALID_ACTOR",
				format!("Header {} must be a numeric id", ACTOR_ID_HEADER),
			)
		})?;

		Ok(ActingActor(Actor::new(role, id)))
	}
}
