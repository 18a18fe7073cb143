//! Registry of every storage and catalog implementation compiled into the
//! service.
//!
//! Implementations register themselves through their crate's
//! `get_all_implementations()`, so the binary never names a backend directly.
//! Configuration picks the backends by name.

use marketplace_catalog::CatalogFactory;
use marketplace_config::Config;
use marketplace_core::{MarketplaceBuilder, MarketplaceEngine, MarketplaceFactories};
use marketplace_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Factory functions keyed by implementation name.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub catalog: HashMap<String, CatalogFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			catalog: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_catalog(&mut self, name: impl Into<String>, factory: CatalogFactory) {
		self.catalog.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the process-wide registry, filling it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in marketplace_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in marketplace_catalog::get_all_implementations() {
			tracing::debug!("Registering catalog implementation: {}", name);
			registry.register_catalog(name, factory);
		}

		registry
	})
}

/// Selects the factories named by a config section, failing on unknown names.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the marketplace engine from configuration using the registry.
pub fn build_marketplace_from_config(
	config: Config,
) -> Result<MarketplaceEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories =
		build_factories!(registry, config.storage.implementations, storage, "storage");
	let catalog_factories =
		build_factories!(registry, config.catalog.implementations, catalog, "catalog");

	let factories = MarketplaceFactories {
		storage_factories,
		catalog_factories,
	};

	Ok(MarketplaceBuilder::new(config).build(factories)?)
}
