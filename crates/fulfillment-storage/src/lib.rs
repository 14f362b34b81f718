//! Storage module for the fulfillment service.
//!
//! This module provides abstractions for persistent storage of orders and
//! delivery persons, supporting pluggable backends (in-memory, file-based)
//! behind a byte-level interface, and a typed service with atomic
//! multi-record transactions on top of it.

use async_trait::async_trait;
use fulfillment_types::ImplementationRegistry;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

mod transaction;

pub use transaction::StorageTransaction;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs when inserting a key that already exists.
	#[error("Key already exists: {0}")]
	Conflict(String),
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

/// A single put applied as part of a batch. Records are never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
	pub key: String,
	pub value: Vec<u8>,
}

impl WriteOp {
	pub fn put(key: impl Into<String>, value: Vec<u8>) -> Self {
		Self {
			key: key.into(),
			value,
		}
	}
}

/// Trait defining the low-level interface for storage backends.
///
/// Backends are plain key-value stores. Coordination between concurrent
/// writers is done by [`StorageService`], so a backend only has to make
/// `write_batch` visible to readers all at once.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists every key starting with `prefix`, in ascending order.
	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Applies a batch of writes, replacing any previous values. Readers see
	/// either none or all of the batch.
	async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<(), StorageError>;
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

pub(crate) fn make_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

pub(crate) fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// High-level storage service that provides typed operations.
///
/// Values are stored as JSON under `<namespace>:<id>` keys. Every write goes
/// through a [`StorageTransaction`]; transactions are serialized by a single
/// async lock, so a read-modify-write sequence inside one transaction never
/// interleaves with another writer. Plain reads do not take the lock and see
/// each committed batch either entirely or not at all.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
	/// Held for the lifetime of each transaction.
	write_lock: Mutex<()>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self {
			backend,
			write_lock: Mutex::new(()),
		}
	}

	/// Starts a transaction, waiting for any running transaction to finish.
	///
	/// Writes are buffered until [`StorageTransaction::commit`]; dropping the
	/// transaction without committing discards them.
	pub async fn begin(&self) -> StorageTransaction<'_> {
		let guard = self.write_lock.lock().await;
		StorageTransaction::new(self.backend.as_ref(), guard)
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&make_key(namespace, id)).await?;
		decode(&bytes)
	}

	/// Retrieves every value in a namespace, ordered by id.
	pub async fn list<T: DeserializeOwned>(&self, namespace: &str) -> Result<Vec<T>, StorageError> {
		let prefix = make_key(namespace, "");
		let mut values = Vec::new();
		for key in self.backend.keys(&prefix).await? {
			values.push(decode(&self.backend.get_bytes(&key).await?)?);
		}
		Ok(values)
	}
}
