//! Buffered, atomically committed storage transactions.

use crate::{decode, encode, make_key, StorageError, StorageInterface, WriteOp};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::MutexGuard;

/// A unit of work against the storage backend.
///
/// Holds the service-wide transaction lock for its whole lifetime. Reads see
/// the transaction's own staged writes first and fall back to the backend.
/// Writes are staged in memory and applied with a single
/// [`StorageInterface::write_batch`] call on [`commit`](Self::commit).
/// Dropping an uncommitted transaction discards everything it staged.
pub struct StorageTransaction<'a> {
	backend: &'a dyn StorageInterface,
	_guard: MutexGuard<'a, ()>,
	/// Staged writes by key.
	pending: BTreeMap<String, Vec<u8>>,
}

impl<'a> StorageTransaction<'a> {
	pub(crate) fn new(backend: &'a dyn StorageInterface, guard: MutexGuard<'a, ()>) -> Self {
		Self {
			backend,
			_guard: guard,
			pending: BTreeMap::new(),
		}
	}

	async fn read_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		if let Some(staged) = self.pending.get(key) {
			return Ok(Some(staged.clone()));
		}
		match self.backend.get_bytes(key).await {
			Ok(bytes) => Ok(Some(bytes)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Retrieves and deserializes a value.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		match self.read_raw(&make_key(namespace, id)).await? {
			Some(bytes) => decode(&bytes),
			None => Err(StorageError::NotFound),
		}
	}

	/// Checks if a value exists, taking staged writes into account.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		let key = make_key(namespace, id);
		if self.pending.contains_key(&key) {
			return Ok(true);
		}
		self.backend.exists(&key).await
	}

	/// Retrieves every value in a namespace, ordered by id.
	pub async fn list<T: DeserializeOwned>(&self, namespace: &str) -> Result<Vec<T>, StorageError> {
		let prefix = make_key(namespace, "");
		let mut keys: BTreeSet<String> = self.backend.keys(&prefix).await?.into_iter().collect();
		keys.extend(
			self.pending
				.range(prefix.clone()..)
				.take_while(|(key, _)| key.starts_with(&prefix))
				.map(|(key, _)| key.clone()),
		);

		let mut values = Vec::with_capacity(keys.len());
		for key in keys {
			if let Some(bytes) = self.read_raw(&key).await? {
				values.push(decode(&bytes)?);
			}
		}
		Ok(values)
	}

	/// Stages a value, creating or overwriting it.
	pub fn store<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes = encode(data)?;
		self.pending.insert(make_key(namespace, id), bytes);
		Ok(())
	}

	/// Stages a new value, failing with `Conflict` if the key already exists.
	pub async fn insert<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		if self.exists(namespace, id).await? {
			return Err(StorageError::Conflict(make_key(namespace, id)));
		}
		self.store(namespace, id, data)
	}

	/// Applies every staged write in one batch and releases the lock.
	pub async fn commit(self) -> Result<(), StorageError> {
		let Self {
			backend,
			_guard,
			pending,
		} = self;

		if pending.is_empty() {
			return Ok(());
		}

		let ops = pending
			.into_iter()
			.map(|(key, value)| WriteOp::put(key, value))
			.collect();
		backend.write_batch(ops).await
	}
}
