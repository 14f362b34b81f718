//! In-memory storage backend implementation.
//!
//! Useful for tests and local development where persistence across restarts
//! is not required.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry, WriteOp};
use async_trait::async_trait;
use fulfillment_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage implementation.
///
/// Keys are kept ordered so prefix scans are range scans. A batch is applied
/// under one write guard, so readers never observe half of it.
pub struct MemoryStorage {
	store: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(BTreeMap::new())),
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
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store.contains_key(key))
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let store = self.store.read().await;
		Ok(store
			.range(prefix.to_string()..)
			.take_while(|(key, _)| key.starts_with(prefix))
			.map(|(key, _)| key.clone())
			.collect())
	}

	async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.extend(ops.into_iter().map(|op| (op.key, op.value)));
		Ok(())
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// No settings; only require that the section is a table.
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
///
/// Configuration parameters:
/// - None required for memory storage
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "test_key";
		let value = b"test_value".to_vec();
		storage
			.write_batch(vec![WriteOp::put(key, value.clone())])
			.await
			.unwrap();

		let retrieved = storage.get_bytes(key).await.unwrap();
		assert_eq!(retrieved, value);
		assert!(storage.exists(key).await.unwrap());

		let result = storage.get_bytes("other_key").await;
		assert!(matches!(result, Err(StorageError::NotFound)));
		assert!(!storage.exists("other_key").await.unwrap());
	}

	#[tokio::test]
	async fn test_prefix_scan() {
		let storage = MemoryStorage::new();
		let ops = ["orders:b", "orders:a", "delivery_persons:x", "ordersx:c"]
			.into_iter()
			.map(|key| WriteOp::put(key, vec![1]))
			.collect();
		storage.write_batch(ops).await.unwrap();

		let keys = storage.keys("orders:").await.unwrap();
		assert_eq!(keys, vec!["orders:a".to_string(), "orders:b".to_string()]);
	}

	#[tokio::test]
	async fn test_write_batch_overwrites() {
		let storage = MemoryStorage::new();
		storage
			.write_batch(vec![WriteOp::put("a", vec![0])])
			.await
			.unwrap();

		storage
			.write_batch(vec![WriteOp::put("a", vec![1]), WriteOp::put("b", vec![2])])
			.await
			.unwrap();

		assert_eq!(storage.get_bytes("a").await.unwrap(), vec![1]);
		assert_eq!(storage.keys("").await.unwrap(), vec!["a", "b"]);
	}

	#[test]
	fn test_factory_rejects_non_table_config() {
		assert!(create_storage(&toml::Value::Table(Default::default())).is_ok());
		let err = create_storage(&toml::Value::String("nope".into())).err();
		assert!(matches!(err, Some(StorageError::Configuration(_))));
	}
}
