//! Catalog implementation backed by the configuration file.
//!
//! Stores and products are declared as arrays of tables under
//! `[catalog.implementations.static]`. Useful for development, demos and tests.

use crate::{
	CatalogError, CatalogFactory, CatalogInterface, CatalogRegistry, Product, Store, Vertical,
};
use async_trait::async_trait;
use marketplace_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
struct StaticCatalogConfig {
	#[serde(default)]
	stores: Vec<Store>,
	#[serde(default)]
	products: Vec<Product>,
}

/// Configuration schema for StaticCatalog.
pub struct StaticCatalogSchema;

impl ConfigSchema for StaticCatalogSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let id = || FieldType::Integer {
			min: Some(1),
			max: None,
		};
		let store = Schema::new(
			vec![
				Field::new("id", id()),
				Field::new("provider_id", id()),
				Field::new("name", FieldType::String),
				Field::new("vertical", FieldType::String).with_validator(|value| {
					let name = value.as_str().unwrap_or_default();
					if Vertical::all().any(|v| v.as_str() == name) {
						Ok(())
					} else {
						Err(format!(
							"unknown vertical '{}', expected restaurant, pharmacy, boutique or grocery",
							name
						))
					}
				}),
			],
			vec![],
		);
		let product = Schema::new(
			vec![
				Field::new("id", id()),
				Field::new("store_id", id()),
				Field::new("name", FieldType::String),
				Field::new(
					"price",
					FieldType::Decimal {
						min: Some(Decimal::ZERO),
						max: None,
					},
				),
			],
			vec![Field::new("available", FieldType::Boolean)],
		);

		Schema::new(
			vec![],
			vec![
				Field::new("stores", FieldType::Array(Box::new(FieldType::Table(store)))),
				Field::new(
					"products",
					FieldType::Array(Box::new(FieldType::Table(product))),
				),
			],
		)
		.validate(config)
	}
}

/// Catalog holding a fixed set of stores and products.
pub struct StaticCatalog {
	stores: HashMap<u64, Store>,
	products: HashMap<u64, Product>,
}

impl StaticCatalog {
	pub fn new(stores: Vec<Store>, products: Vec<Product>) -> Self {
		Self {
			stores: stores.into_iter().map(|s| (s.id, s)).collect(),
			products: products.into_iter().map(|p| (p.id, p)).collect(),
		}
	}

	fn from_config(config: StaticCatalogConfig) -> Result<Self, CatalogError> {
		let store_count = config.stores.len();
		let product_count = config.products.len();
		let catalog = Self::new(config.stores, config.products);

		if catalog.stores.len() != store_count {
			return Err(CatalogError::Configuration("Duplicate store id".into()));
		}
		if catalog.products.len() != product_count {
			return Err(CatalogError::Configuration("Duplicate product id".into()));
		}
		if let Some(orphan) = catalog
			.products
			.values()
			.find(|p| !catalog.stores.contains_key(&p.store_id))
		{
			return Err(CatalogError::Configuration(format!(
				"Product {} references unknown store {}",
				orphan.id, orphan.store_id
			)));
		}

		Ok(catalog)
	}
}

#[async_trait]
impl CatalogInterface for StaticCatalog {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(StaticCatalogSchema)
	}

	async fn get_product(&self, product_id: u64) -> Result<Product, CatalogError> {
		self.products
			.get(&product_id)
			.cloned()
			.ok_or(CatalogError::ProductNotFound(product_id))
	}

	async fn get_store(&self, store_id: u64) -> Result<Store, CatalogError> {
		self.stores
			.get(&store_id)
			.cloned()
			.ok_or(CatalogError::StoreNotFound(store_id))
	}
}

/// Factory function to create a static catalog from configuration.
pub fn create_catalog(config: &toml::Value) -> Result<Box<dyn CatalogInterface>, CatalogError> {
	StaticCatalogSchema
		.validate(config)
		.map_err(|e| CatalogError::Configuration(e.to_string()))?;

	let parsed: StaticCatalogConfig = config
		.clone()
		.try_into()
		.map_err(|e| CatalogError::Configuration(format!("Invalid static catalog: {}", e)))?;
	let catalog = StaticCatalog::from_config(parsed)?;

	tracing::debug!(
		stores = catalog.stores.len(),
		products = catalog.products.len(),
		"Loaded static catalog"
	);
	Ok(Box::new(catalog))
}

/// Registry for the static catalog implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "static";
	type Factory = CatalogFactory;

	fn factory() -> Self::Factory {
		create_catalog
	}
}

impl CatalogRegistry for Registry {}
