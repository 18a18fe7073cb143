//! File-based storage backend for the marketplace.
//!
//! Each record lives in its own file under `<storage_path>/<namespace>/<id>.bin`.
//! A batch is first written to a journal, then applied file by file with
//! temp-file-and-rename writes, and finally the journal is removed. A journal
//! left behind by a crash is replayed when the storage is opened again, so a
//! batch is either fully visible or not at all once the backend is up. Within
//! the process, readers wait for an in-flight batch to finish, and a journal
//! left by a failed commit is completed before the next batch is accepted.
//!
//! The directory is guarded by an exclusive lock file: two processes never
//! write to the same storage path.

use crate::{StorageError, StorageInterface, WriteBatch};
use async_trait::async_trait;
use fs2::FileExt;
use marketplace_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

const DEFAULT_STORAGE_PATH: &str = "./data/storage";
const JOURNAL_FILE: &str = "batch.journal";
const LOCK_FILE: &str = ".lock";
const SEQUENCE_DIR: &str = "_sequences";

/// A batch that has been accepted but maybe not fully applied.
#[derive(Debug, Serialize, Deserialize)]
struct Journal {
	entries: Vec<JournalEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
	key: String,
	value: Vec<u8>,
}

fn backend_error(e: std::io::Error) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// Readers share it; commits and sequence updates take it exclusively.
	lock: RwLock<()>,
	/// Held for the lifetime of the storage; dropping it releases the lock.
	_dir_lock: std::fs::File,
}

impl FileStorage {
	/// Opens the storage directory, taking the directory lock and replaying
	/// any unfinished batch.
	pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
		let base_path = base_path.into();
		std::fs::create_dir_all(&base_path).map_err(backend_error)?;

		let dir_lock = std::fs::OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(base_path.join(LOCK_FILE))
			.map_err(backend_error)?;
		dir_lock.try_lock_exclusive().map_err(|e| {
			StorageError::Backend(format!(
				"Storage path {} is locked by another process: {}",
				base_path.display(),
				e
			))
		})?;

		let storage = Self {
			base_path,
			lock: RwLock::new(()),
			_dir_lock: dir_lock,
		};
		storage.replay_journal()?;
		Ok(storage)
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let (namespace, id) = key.split_once(':').unwrap_or(("_default", key));
		self.base_path
			.join(sanitize(namespace))
			.join(format!("{}.bin", sanitize(id)))
	}

	fn journal_path(&self) -> PathBuf {
		self.base_path.join(JOURNAL_FILE)
	}

	fn sequence_path(&self, name: &str) -> PathBuf {
		self.base_path
			.join(SEQUENCE_DIR)
			.join(format!("{}.seq", sanitize(name)))
	}

	/// Applies a journal left by an interrupted commit.
	fn replay_journal(&self) -> Result<(), StorageError> {
		let journal_path = self.journal_path();
		let data = match std::fs::read(&journal_path) {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
			Err(e) => return Err(backend_error(e)),
		};

		let journal: Journal = serde_json::from_slice(&data).map_err(|e| {
			StorageError::Serialization(format!("Corrupt batch journal: {}", e))
		})?;
		tracing::warn!(
			entries = journal.entries.len(),
			"Replaying unfinished storage batch"
		);

		for entry in &journal.entries {
			let path = self.get_file_path(&entry.key);
			if let Some(parent) = path.parent() {
				std::fs::create_dir_all(parent).map_err(backend_error)?;
			}
			let temp_path = path.with_extension("tmp");
			std::fs::write(&temp_path, &entry.value).map_err(backend_error)?;
			std::fs::rename(&temp_path, &path).map_err(backend_error)?;
		}
		std::fs::remove_file(&journal_path).map_err(backend_error)
	}

	/// Writes every journaled entry, then drops the journal.
	///
	/// Failing to remove the journal only means the same entries are written
	/// again before the next batch, so it does not fail the commit.
	async fn apply_journal(&self, journal: &Journal) -> Result<(), StorageError> {
		for entry in &journal.entries {
			write_atomic(&self.get_file_path(&entry.key), &entry.value).await?;
		}
		if let Err(e) = fs::remove_file(self.journal_path()).await {
			tracing::warn!(error = %e, "Failed to remove applied batch journal");
		}
		Ok(())
	}

	/// Completes a batch whose commit failed part way through.
	async fn finish_pending_batch(&self) -> Result<(), StorageError> {
		let Some(data) = self.read_optional(&self.journal_path()).await? else {
			return Ok(());
		};
		let journal: Journal = serde_json::from_slice(&data).map_err(|e| {
			StorageError::Serialization(format!("Corrupt batch journal: {}", e))
		})?;
		tracing::warn!(
			entries = journal.entries.len(),
			"Completing unfinished storage batch"
		);
		self.apply_journal(&journal).await
	}

	async fn read_optional(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
		match fs::read(path).await {
			Ok(data) => Ok(Some(data)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(backend_error(e)),
		}
	}
}

/// Replaces path separators so a key segment stays a single path component.
fn sanitize(segment: &str) -> String {
	segment.replace(['/', '\\'], "_")
}

/// Writes a file atomically by writing to a temp file then renaming.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).await.map_err(backend_error)?;
	}
	let temp_path = path.with_extension("tmp");
	fs::write(&temp_path, data).await.map_err(backend_error)?;
	fs::rename(&temp_path, path).await.map_err(backend_error)
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let _guard = self.lock.read().await;
		self.read_optional(&self.get_file_path(key))
			.await?
			.ok_or(StorageError::NotFound)
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let _guard = self.lock.read().await;
		fs::try_exists(self.get_file_path(key))
			.await
			.map_err(backend_error)
	}

	async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let _guard = self.lock.read().await;
		let dir = self.base_path.join(sanitize(namespace));
		let mut entries = match fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(backend_error(e)),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await.map_err(backend_error)? {
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
				keys.push(format!("{}:{}", namespace, id));
			}
		}
		keys.sort();
		Ok(keys)
	}

	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
		let _guard = self.lock.write().await;
		self.finish_pending_batch().await?;

		for op in batch.ops() {
			let current = self.read_optional(&self.get_file_path(op.key())).await?;
			op.check(current.as_deref())?;
		}

		let journal = Journal {
			entries: batch
				.into_ops()
				.into_iter()
				.map(|op| {
					let (key, value) = op.into_entry();
					JournalEntry { key, value }
				})
				.collect(),
		};
		let encoded =
			serde_json::to_vec(&journal).map_err(|e| StorageError::Serialization(e.to_string()))?;
		write_atomic(&self.journal_path(), &encoded).await?;
		self.apply_journal(&journal).await
	}

	async fn next_sequence(&self, name: &str) -> Result<u64, StorageError> {
		let _guard = self.lock.write().await;
		let path = self.sequence_path(name);

		let current = match self.read_optional(&path).await? {
			Some(data) => String::from_utf8_lossy(&data)
				.trim()
				.parse::<u64>()
				.map_err(|e| {
					StorageError::Serialization(format!("Corrupt sequence {}: {}", name, e))
				})?,
			None => 0,
		};
		let next = current + 1;
		write_atomic(&path, next.to_string().as_bytes()).await?;
		Ok(next)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if path.trim().is_empty() => {
							Err("storage_path must not be empty".to_string())
						},
						_ => Ok(()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::open(storage_path)?))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl marketplace_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
