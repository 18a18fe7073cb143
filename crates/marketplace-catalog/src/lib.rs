//! Catalog module for the marketplace.
//!
//! The catalog owns products and stores; the order system only reads them. An
//! order line snapshots the product's price, name and store at creation time,
//! so later catalog changes never alter existing orders.

use async_trait::async_trait;
use marketplace_types::{ConfigSchema, ImplementationRegistry};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod static_catalog;
}

/// Errors that can occur during catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
	#[error("Product not found: {0}")]
	ProductNotFound(u64),
	#[error("Store not found: {0}")]
	StoreNotFound(u64),
	/// The catalog backend cannot answer right now.
	#[error("Catalog unavailable: {0}")]
	Unavailable(String),
	/// Error that occurs when configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Business line a store belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Vertical {
	Restaurant,
	Pharmacy,
	Boutique,
	Grocery,
}

impl Vertical {
	pub fn as_str(&self) -> &'static str {
		match self {
			Vertical::Restaurant => "restaurant",
			Vertical::Pharmacy => "pharmacy",
			Vertical::Boutique => "boutique",
			Vertical::Grocery => "grocery",
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[
			Vertical::Restaurant,
			Vertical::Pharmacy,
			Vertical::Boutique,
			Vertical::Grocery,
		]
		.into_iter()
	}
}

impl fmt::Display for Vertical {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A store run by a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
	pub id: u64,
	/// Provider owning the store
	pub provider_id: u64,
	pub name: String,
	pub vertical: Vertical,
}

/// A product sold by a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
	pub id: u64,
	pub store_id: u64,
	pub name: String,
	/// Current unit price
	pub price: Decimal,
	#[serde(default = "default_available")]
	pub available: bool,
}

fn default_available() -> bool {
	true
}

/// Trait defining the interface for catalog implementations.
#[async_trait]
pub trait CatalogInterface: Send + Sync {
	/// Returns the configuration schema for this catalog implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Looks up a product by id.
	async fn get_product(&self, product_id: u64) -> Result<Product, CatalogError>;

	/// Looks up a store by id.
	async fn get_store(&self, store_id: u64) -> Result<Store, CatalogError>;
}

/// Type alias for catalog factory functions.
pub type CatalogFactory = fn(&toml::Value) -> Result<Box<dyn CatalogInterface>, CatalogError>;

/// Registry trait for catalog implementations.
pub trait CatalogRegistry: ImplementationRegistry<Factory = CatalogFactory> {}

/// Get all registered catalog implementations.
pub fn get_all_implementations() -> Vec<(&'static str, CatalogFactory)> {
	use implementations::static_catalog;

	vec![(
		static_catalog::Registry::NAME,
		static_catalog::Registry::factory(),
	)]
}

/// Service that answers catalog lookups from the primary implementation.
pub struct CatalogService {
	/// Map of implementation names to their interfaces.
	implementations: HashMap<String, Arc<dyn CatalogInterface>>,
	/// The implementation lookups are served from.
	primary_implementation: String,
}

impl CatalogService {
	pub fn new(
		implementations: HashMap<String, Arc<dyn CatalogInterface>>,
		primary_implementation: String,
	) -> Result<Self, CatalogError> {
		if !implementations.contains_key(&primary_implementation) {
			return Err(CatalogError::Configuration(format!(
				"Primary implementation '{}' not found in available implementations",
				primary_implementation
			)));
		}

		Ok(Self {
			implementations,
			primary_implementation,
		})
	}

	fn primary(&self) -> Result<&Arc<dyn CatalogInterface>, CatalogError> {
		self.implementations
			.get(&self.primary_implementation)
			.ok_or_else(|| {
				CatalogError::Unavailable(format!(
					"Primary implementation '{}' not available",
					self.primary_implementation
				))
			})
	}

	pub async fn get_product(&self, product_id: u64) -> Result<Product, CatalogError> {
		self.primary()?.get_product(product_id).await
	}

	pub async fn get_store(&self, store_id: u64) -> Result<Store, CatalogError> {
		self.primary()?.get_store(store_id).await
	}
}
