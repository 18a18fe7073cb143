//! Builder pattern for constructing marketplace engines.
//!
//! Composes a MarketplaceEngine from the storage and catalog implementations
//! named in the configuration, using factory functions looked up by name.

use crate::engine::MarketplaceEngine;
use marketplace_catalog::{CatalogError, CatalogInterface, CatalogService};
use marketplace_config::Config;
use marketplace_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for the factory functions needed to build a MarketplaceEngine.
pub struct MarketplaceFactories<SF, CF> {
	pub storage_factories: HashMap<String, SF>,
	pub catalog_factories: HashMap<String, CF>,
}

/// Builder for constructing a MarketplaceEngine with pluggable implementations.
pub struct MarketplaceBuilder {
	config: Config,
}

impl MarketplaceBuilder {
	/// Creates a new MarketplaceBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine, instantiating every configured implementation that
	/// has a registered factory.
	pub fn build<SF, CF>(
		self,
		factories: MarketplaceFactories<SF, CF>,
	) -> Result<MarketplaceEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		CF: Fn(&toml::Value) -> Result<Box<dyn CatalogInterface>, CatalogError>,
	{
		// Only the primary storage is opened: file backends lock their directory
		let primary_storage = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary storage '{}' has no configuration",
					primary_storage
				))
			})?;
		let storage_factory = factories
			.storage_factories
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!("storage implementation '{}'", primary_storage))
			})?;
		let storage_backend = storage_factory(storage_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary_storage,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				primary_storage, e
			))
		})?;
		tracing::info!(
			component = "storage",
			implementation = %primary_storage,
			timeout_ms = self.config.storage.timeout_ms,
			"Loaded"
		);
		let storage = Arc::new(
			StorageService::new(storage_backend).with_timeout(self.config.storage_timeout()),
		);

		// Create catalog implementations
		let mut catalog_impls: HashMap<String, Arc<dyn CatalogInterface>> = HashMap::new();
		for (name, config) in &self.config.catalog.implementations {
			let Some(factory) = factories.catalog_factories.get(name) else {
				tracing::warn!(component = "catalog", implementation = %name, "No factory registered, skipping");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					let is_primary = &self.config.catalog.primary == name;
					tracing::info!(component = "catalog", implementation = %name, enabled = %is_primary, "Loaded");
					catalog_impls.insert(name.clone(), implementation.into());
				},
				Err(e) => {
					tracing::error!(
						component = "catalog",
						implementation = %name,
						error = %e,
						"Failed to create catalog implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create catalog implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if catalog_impls.is_empty() {
			return Err(BuilderError::Config(
				"No valid catalog implementations available".into(),
			));
		}

		let catalog = CatalogService::new(catalog_impls, self.config.catalog.primary.clone())
			.map_err(|e| BuilderError::Config(e.to_string()))?;

		Ok(MarketplaceEngine::new(self.config, storage, Arc::new(catalog)))
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use marketplace_storage::StorageFactory;

	pub(crate) const TEST_CONFIG: &str = r#"
[marketplace]
id = "test-marketplace"

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

[[catalog.implementations.static.stores]]
id = 2
provider_id = 20
name = "Pharmacie Centrale"
vertical = "pharmacy"

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

[[catalog.implementations.static.products]]
id = 102
store_id = 1
name = "Mechoui"
price = "12.00"
available = false

[[catalog.implementations.static.products]]
id = 200
store_id = 2
name = "Vitamin C"
price = "7.50"
"#;

	fn factories(
	) -> MarketplaceFactories<StorageFactory, marketplace_catalog::CatalogFactory> {
		MarketplaceFactories {
			storage_factories: marketplace_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			catalog_factories: marketplace_catalog::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	/// Engine over in-memory storage and a small static catalog.
	pub(crate) fn test_engine() -> MarketplaceEngine {
		let config: Config = TEST_CONFIG.parse().unwrap();
		MarketplaceBuilder::new(config).build(factories()).unwrap()
	}

	#[test]
	fn test_builds_from_config() {
		let engine = test_engine();
		assert_eq!(engine.config().marketplace.id, "test-marketplace");
	}

	#[test]
	fn test_unregistered_primary_storage() {
		let config: Config = TEST_CONFIG
			.replace("primary = \"memory\"", "primary = \"redis\"")
			.replace("[storage.implementations.memory]", "[storage.implementations.redis]")
			.parse()
			.unwrap();
		let result = MarketplaceBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[test]
	fn test_invalid_catalog_fails_build() {
		let config: Config = TEST_CONFIG
			.replace("vertical = \"pharmacy\"", "vertical = \"bakery\"")
			.parse()
			.unwrap();
		let result = MarketplaceBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}
}
