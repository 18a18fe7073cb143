//! Storage module for the marketplace.
//!
//! This module provides the persistence adapter of the order system. Backends
//! implement a small key-value interface whose only mutating operation is an
//! atomic write batch; the batch carries the uniqueness and compare-and-swap
//! preconditions that keep concurrent order updates consistent. On top of it,
//! [`StorageService`] adds typed access and call timeouts, and
//! [`OrderRepository`] maps order and delivery operations onto batches.

use async_trait::async_trait;
use marketplace_types::{ConfigSchema, ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

pub mod repository;

pub use repository::OrderRepository;

/// Default upper bound for a single storage call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// A write precondition failed: the key already exists or changed since it was read.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// The backend did not answer in time.
	#[error("Storage call timed out after {0:?}")]
	Timeout(Duration),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Builds the backend key for a record.
pub fn storage_key(namespace: &str, id: impl std::fmt::Display) -> String {
	format!("{}:{}", namespace, id)
}

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
	/// Writes the value unconditionally.
	Put { key: String, value: Vec<u8> },
	/// Writes the value only if the key does not exist yet.
	Insert { key: String, value: Vec<u8> },
	/// Writes the value only if the stored bytes still equal `expected`.
	CompareAndSwap {
		key: String,
		expected: Vec<u8>,
		value: Vec<u8>,
	},
}

impl WriteOp {
	pub fn key(&self) -> &str {
		match self {
			WriteOp::Put { key, .. }
			| WriteOp::Insert { key, .. }
			| WriteOp::CompareAndSwap { key, .. } => key,
		}
	}

	pub fn value(&self) -> &[u8] {
		match self {
			WriteOp::Put { value, .. }
			| WriteOp::Insert { value, .. }
			| WriteOp::CompareAndSwap { value, .. } => value,
		}
	}

	/// Consumes the op into the key and the bytes it writes.
	pub fn into_entry(self) -> (String, Vec<u8>) {
		match self {
			WriteOp::Put { key, value }
			| WriteOp::Insert { key, value }
			| WriteOp::CompareAndSwap { key, value, .. } => (key, value),
		}
	}

	/// Checks this write's precondition against the currently stored bytes.
	pub fn check(&self, current: Option<&[u8]>) -> Result<(), StorageError> {
		match (self, current) {
			(WriteOp::Put { .. }, _) => Ok(()),
			(WriteOp::Insert { .. }, None) => Ok(()),
			(WriteOp::Insert { key, .. }, Some(_)) => {
				Err(StorageError::Conflict(format!("key {} already exists", key)))
			},
			(WriteOp::CompareAndSwap { expected, .. }, Some(stored)) if stored == expected.as_slice() => Ok(()),
			(WriteOp::CompareAndSwap { key, .. }, Some(_)) => Err(StorageError::Conflict(
				format!("key {} was modified concurrently", key),
			)),
			(WriteOp::CompareAndSwap { key, .. }, None) => {
				Err(StorageError::Conflict(format!("key {} no longer exists", key)))
			},
		}
	}
}

/// A group of writes applied all-or-nothing.
///
/// Preconditions are evaluated against the state before the batch; if any of
/// them fails, nothing is written and the backend returns
/// [`StorageError::Conflict`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
	ops: Vec<WriteOp>,
}

impl WriteBatch {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an unconditional write.
	pub fn put<T: Serialize>(
		&mut self,
		namespace: StorageKey,
		id: impl std::fmt::Display,
		value: &T,
	) -> Result<(), StorageError> {
		self.ops.push(WriteOp::Put {
			key: storage_key(namespace.as_str(), id),
			value: encode(value)?,
		});
		Ok(())
	}

	/// Adds a write that fails the batch if the record already exists.
	pub fn insert<T: Serialize>(
		&mut self,
		namespace: StorageKey,
		id: impl std::fmt::Display,
		value: &T,
	) -> Result<(), StorageError> {
		self.ops.push(WriteOp::Insert {
			key: storage_key(namespace.as_str(), id),
			value: encode(value)?,
		});
		Ok(())
	}

	/// Adds a write that fails the batch if the record changed since
	/// `previous` was read.
	pub fn compare_and_swap<T: Serialize, P>(
		&mut self,
		namespace: StorageKey,
		id: impl std::fmt::Display,
		previous: &Versioned<P>,
		value: &T,
	) -> Result<(), StorageError> {
		self.ops.push(WriteOp::CompareAndSwap {
			key: storage_key(namespace.as_str(), id),
			expected: previous.raw.clone(),
			value: encode(value)?,
		});
		Ok(())
	}

	pub fn ops(&self) -> &[WriteOp] {
		&self.ops
	}

	pub fn into_ops(self) -> Vec<WriteOp> {
		self.ops
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}

	pub fn len(&self) -> usize {
		self.ops.len()
	}
}

impl From<Vec<WriteOp>> for WriteBatch {
	fn from(ops: Vec<WriteOp>) -> Self {
		Self { ops }
	}
}

/// A decoded record together with the exact bytes it was decoded from.
///
/// The bytes are the version used by [`WriteBatch::compare_and_swap`].
#[derive(Debug, Clone)]
pub struct Versioned<T> {
	pub value: T,
	raw: Vec<u8>,
}

impl<T> Versioned<T> {
	pub fn into_inner(self) -> T {
		self.value
	}
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Trait defining the low-level interface for storage backends.
///
/// Reads are plain key lookups. All writes go through [`commit`], which must
/// apply a batch atomically with respect to every other call on the backend.
///
/// [`commit`]: StorageInterface::commit
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists all keys of a namespace, as full `namespace:id` keys.
	async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError>;

	/// Applies a write batch all-or-nothing.
	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError>;

	/// Returns the next value of a named sequence, starting at 1.
	async fn next_sequence(&self, name: &str) -> Result<u64, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level storage service that provides typed operations.
///
/// Every call is bounded by a timeout so a stalled backend surfaces as
/// [`StorageError::Timeout`] instead of hanging the request.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
	/// Upper bound for each call.
	timeout: Duration,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self {
			backend,
			timeout: DEFAULT_TIMEOUT,
		}
	}

	/// Replaces the per-call timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	async fn bounded<T>(
		&self,
		call: impl Future<Output = Result<T, StorageError>>,
	) -> Result<T, StorageError> {
		match tokio::time::timeout(self.timeout, call).await {
			Ok(result) => result,
			Err(_) => {
				tracing::warn!(timeout = ?self.timeout, "Storage call timed out");
				Err(StorageError::Timeout(self.timeout))
			},
		}
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: impl std::fmt::Display,
	) -> Result<T, StorageError> {
		Ok(self.retrieve_versioned(namespace, id).await?.value)
	}

	/// Retrieves a value along with the version needed for a later
	/// compare-and-swap.
	pub async fn retrieve_versioned<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: impl std::fmt::Display,
	) -> Result<Versioned<T>, StorageError> {
		let key = storage_key(namespace.as_str(), id);
		let raw = self.bounded(self.backend.get_bytes(&key)).await?;
		Ok(Versioned {
			value: decode(&raw)?,
			raw,
		})
	}

	/// Retrieves a value, mapping a missing key to `None`.
	pub async fn find<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
		id: impl std::fmt::Display,
	) -> Result<Option<Versioned<T>>, StorageError> {
		match self.retrieve_versioned(namespace, id).await {
			Ok(found) => Ok(Some(found)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Checks if a value exists in storage.
	pub async fn exists(
		&self,
		namespace: StorageKey,
		id: impl std::fmt::Display,
	) -> Result<bool, StorageError> {
		let key = storage_key(namespace.as_str(), id);
		self.bounded(self.backend.exists(&key)).await
	}

	/// Loads every record of a namespace as `(id, value)` pairs.
	///
	/// Records removed between listing and reading are skipped.
	pub async fn list<T: DeserializeOwned>(
		&self,
		namespace: StorageKey,
	) -> Result<Vec<(String, T)>, StorageError> {
		self.bounded(async {
			let keys = self.backend.list_keys(namespace.as_str()).await?;
			let prefix = format!("{}:", namespace.as_str());
			let mut records = Vec::with_capacity(keys.len());
			for key in keys {
				let bytes = match self.backend.get_bytes(&key).await {
					Ok(bytes) => bytes,
					Err(StorageError::NotFound) => continue,
					Err(e) => return Err(e),
				};
				let id = key.strip_prefix(&prefix).unwrap_or(&key).to_string();
				records.push((id, decode(&bytes)?));
			}
			Ok(records)
		})
		.await
	}

	/// Applies a batch atomically.
	pub async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
		if batch.is_empty() {
			return Ok(());
		}
		self.bounded(self.backend.commit(batch)).await
	}

	/// Returns the next identifier of a named sequence.
	pub async fn next_id(&self, sequence: &str) -> Result<u64, StorageError> {
		self.bounded(self.backend.next_sequence(sequence)).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;

	/// Backend that never answers in time.
	struct StalledStorage;

	#[async_trait]
	impl StorageInterface for StalledStorage {
		async fn get_bytes(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Err(StorageError::NotFound)
		}

		async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(false)
		}

		async fn list_keys(&self, _namespace: &str) -> Result<Vec<String>, StorageError> {
			Ok(Vec::new())
		}

		async fn commit(&self, _batch: WriteBatch) -> Result<(), StorageError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(())
		}

		async fn next_sequence(&self, _name: &str) -> Result<u64, StorageError> {
			Ok(1)
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unreachable!("not used in tests")
		}
	}

	#[tokio::test]
	async fn test_calls_time_out() {
		let service =
			StorageService::new(Box::new(StalledStorage)).with_timeout(Duration::from_millis(20));

		let result = service.retrieve::<u64>(StorageKey::Orders, 1).await;
		assert!(matches!(result, Err(StorageError::Timeout(_))));

		let mut batch = WriteBatch::new();
		batch.put(StorageKey::Orders, 1, &1u64).unwrap();
		assert!(matches!(
			service.commit(batch).await,
			Err(StorageError::Timeout(_))
		));
	}

	#[tokio::test]
	async fn test_typed_round_trip_and_versions() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));

		let mut batch = WriteBatch::new();
		batch.insert(StorageKey::Orders, 7, &"first").unwrap();
		service.commit(batch).await.unwrap();

		let current = service
			.retrieve_versioned::<String>(StorageKey::Orders, 7)
			.await
			.unwrap();
		assert_eq!(current.value, "first");

		let mut swap = WriteBatch::new();
		swap.compare_and_swap(StorageKey::Orders, 7, &current, &"second")
			.unwrap();
		service.commit(swap.clone()).await.unwrap();

		// The same swap replayed against the new value must lose
		assert!(matches!(
			service.commit(swap).await,
			Err(StorageError::Conflict(_))
		));

		let listed = service.list::<String>(StorageKey::Orders).await.unwrap();
		assert_eq!(listed, vec![("7".to_string(), "second".to_string())]);
		assert!(service
			.find::<String>(StorageKey::Deliveries, 7)
			.await
			.unwrap()
			.is_none());
	}

	#[test]
	fn test_preconditions() {
		let insert = WriteOp::Insert {
			key: "orders:1".into(),
			value: b"x".to_vec(),
		};
		assert!(insert.check(None).is_ok());
		assert!(matches!(
			insert.check(Some(b"y")),
			Err(StorageError::Conflict(_))
		));

		let swap = WriteOp::CompareAndSwap {
			key: "orders:1".into(),
			expected: b"old".to_vec(),
			value: b"new".to_vec(),
		};
		assert!(swap.check(Some(b"old")).is_ok());
		assert!(swap.check(Some(b"other")).is_err());
		assert!(swap.check(None).is_err());
	}
}
