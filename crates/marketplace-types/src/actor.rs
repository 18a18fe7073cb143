//! Identity of whoever performs a marketplace operation.
//!
//! The actor is resolved once at the API boundary and passed down as a typed
//! value. Business logic never infers a role from which fields are populated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authenticated identity performing an operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
	Customer { id: u64 },
	Provider { id: u64 },
	DeliveryPerson { id: u64 },
	/// Back-office operator, also used for system-triggered operations.
	Admin { id: u64 },
}

impl Actor {
	/// Builds an actor from a role and an identifier.
	pub fn new(role: ActorRole, id: u64) -> Self {
		match role {
			ActorRole::Customer => Actor::Customer { id },
			ActorRole::Provider => Actor::Provider { id },
			ActorRole::DeliveryPerson => Actor::DeliveryPerson { id },
			ActorRole::Admin => Actor::Admin { id },
		}
	}

	pub fn role(&self) -> ActorRole {
		match self {
			Actor::Customer { .. } => ActorRole::Customer,
			Actor::Provider { .. } => ActorRole::Provider,
			Actor::DeliveryPerson { .. } => ActorRole::DeliveryPerson,
			Actor::Admin { .. } => ActorRole::Admin,
		}
	}

	pub fn id(&self) -> u64 {
		match self {
			Actor::Customer { id }
			| Actor::Provider { id }
			| Actor::DeliveryPerson { id }
			| Actor::Admin { id } => *id,
		}
	}
}

impl fmt::Display for Actor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.role(), self.id())
	}
}

/// Role part of an [`Actor`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
	Customer,
	Provider,
	DeliveryPerson,
	Admin,
}

impl ActorRole {
	pub fn as_str(&self) -> &'static str {
		match self {
			ActorRole::Customer => "customer",
			ActorRole::Provider => "provider",
			ActorRole::DeliveryPerson => "delivery_person",
			ActorRole::Admin => "admin",
		}
	}
}

impl fmt::Display for ActorRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ActorRole {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"customer" => Ok(Self::Customer),
			"provider" => Ok(Self::Provider),
			"delivery_person" => Ok(Self::DeliveryPerson),
			"admin" => Ok(Self::Admin),
			other => Err(format!("Unknown actor role: {}", other)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_actor_serializes_as_tagged_variant() {
		let actor = Actor::DeliveryPerson { id: 4 };
		let json = serde_json::to_value(actor).unwrap();
		assert_eq!(json, serde_json::json!({ "role": "delivery_person", "id": 4 }));
		assert_eq!(actor.to_string(), "delivery_person:4");
	}

	#[test]
	fn test_role_parsing() {
		assert_eq!("Provider".parse::<ActorRole>().unwrap(), ActorRole::Provider);
		assert_eq!(Actor::new(ActorRole::Admin, 1), Actor::Admin { id: 1 });
		assert!("courier".parse::<ActorRole>().is_err());
	}
}
