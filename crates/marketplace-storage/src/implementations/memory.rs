//! In-memory storage backend implementation for the marketplace.
//!
//! This module provides a memory-based implementation of the StorageInterface trait,
//! useful for testing and development scenarios where persistence is not required.

use crate::{StorageError, StorageInterface, WriteBatch};
use async_trait::async_trait;
use marketplace_types::{ConfigSchema, Schema, ValidationError};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
	/// Ordered so namespace listings come out sorted.
	entries: BTreeMap<String, Vec<u8>>,
	sequences: HashMap<String, u64>,
}

/// In-memory storage implementation.
///
/// A whole batch is checked and applied under a single write guard, so
/// concurrent commits are serialized.
pub struct MemoryStorage {
	state: RwLock<MemoryState>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			state: RwLock::new(MemoryState::default()),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let state = self.state.read().await;
		state.entries.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let state = self.state.read().await;
		Ok(state.entries.contains_key(key))
	}

	async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let prefix = format!("{}:", namespace);
		let state = self.state.read().await;
		Ok(state
			.entries
			.range(prefix.clone()..)
			.take_while(|(key, _)| key.starts_with(&prefix))
			.map(|(key, _)| key.clone())
			.collect())
	}

	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
		let mut state = self.state.write().await;

		for op in batch.ops() {
			op.check(state.entries.get(op.key()).map(Vec::as_slice))?;
		}
		state
			.entries
			.extend(batch.into_ops().into_iter().map(|op| op.into_entry()));
		Ok(())
	}

	async fn next_sequence(&self, name: &str) -> Result<u64, StorageError> {
		let mut state = self.state.write().await;
		let counter = state.sequences.entry(name.to_string()).or_insert(0);
		*counter += 1;
		Ok(*counter)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no configuration
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl marketplace_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
