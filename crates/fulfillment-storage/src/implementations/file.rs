//! File-based storage backend implementation.
//!
//! Each key is stored in its own file under the storage directory, named by
//! the SHA3-256 digest of the key so names have a fixed length whatever the
//! id. The key itself is kept inside the file after the header, which is
//! what prefix scans read back.
//!
//! A batch is staged to temp files, recorded in a journal, then renamed into
//! place. An interrupted batch is finished from its journal by the next
//! commit or the next open.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry, WriteOp};
use async_trait::async_trait;
use fs2::FileExt;
use fulfillment_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

const DATA_EXTENSION: &str = "bin";
const TEMP_EXTENSION: &str = "tmp";
const LOCK_FILE: &str = ".lock";
const JOURNAL_FILE: &str = ".journal";
const JOURNAL_TEMP_FILE: &str = ".journal.tmp";

/// Fixed-size file header.
///
/// Binary layout (16 bytes total):
/// - [0-3]: Magic bytes "FLFS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-9]: Key length in bytes (u32, little-endian)
/// - [10-15]: Reserved
///
/// The header is followed by the UTF-8 key and then the value.
#[derive(Debug, Clone, PartialEq)]
struct FileHeader {
	version: u16,
	key_len: u32,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"FLFS";
	const VERSION: u16 = 2;
	const SIZE: usize = 16;

	fn for_key(key: &str) -> Result<Self, StorageError> {
		let key_len = u32::try_from(key.len())
			.map_err(|_| StorageError::Backend("Key too long".into()))?;
		Ok(Self {
			version: Self::VERSION,
			key_len,
		})
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..10].copy_from_slice(&self.key_len.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Unrecognized file format".into()));
		}
		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version != Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}
		let key_len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
		Ok(Self { version, key_len })
	}
}

fn encode_record(key: &str, value: &[u8]) -> Result<Vec<u8>, StorageError> {
	let header = FileHeader::for_key(key)?;
	let mut bytes = Vec::with_capacity(FileHeader::SIZE + key.len() + value.len());
	bytes.extend_from_slice(&header.serialize());
	bytes.extend_from_slice(key.as_bytes());
	bytes.extend_from_slice(value);
	Ok(bytes)
}

/// Splits a record file into its key and value.
fn decode_record(data: &[u8]) -> Result<(&str, &[u8]), StorageError> {
	let header = FileHeader::deserialize(data)?;
	let key_end = FileHeader::SIZE + header.key_len as usize;
	if data.len() < key_end {
		return Err(StorageError::Backend("Truncated record file".into()));
	}
	let key = std::str::from_utf8(&data[FileHeader::SIZE..key_end])
		.map_err(|e| StorageError::Backend(format!("Invalid key in record file: {}", e)))?;
	Ok((key, &data[key_end..]))
}

fn key_digest(key: &str) -> String {
	hex::encode(Sha3_256::digest(key.as_bytes()))
}

fn backend_err(e: std::io::Error) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// Renames still to be applied for a committed batch.
#[derive(Debug, Serialize, Deserialize)]
struct Journal {
	/// `(staged, record)` file names relative to the storage directory.
	renames: Vec<(String, String)>,
}

fn remove_if_present(path: &Path) -> Result<(), StorageError> {
	match std::fs::remove_file(path) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
		Err(e) => Err(backend_err(e)),
	}
}

fn write_file(path: &Path, bytes: &[u8], sync: bool) -> Result<(), StorageError> {
	let mut file = File::create(path).map_err(backend_err)?;
	file.write_all(bytes).map_err(backend_err)?;
	if sync {
		file.sync_all().map_err(backend_err)?;
	}
	Ok(())
}

fn write_journal(dir: &Path, journal: &Journal, sync: bool) -> Result<(), StorageError> {
	let bytes =
		serde_json::to_vec(journal).map_err(|e| StorageError::Serialization(e.to_string()))?;
	let temp_path = dir.join(JOURNAL_TEMP_FILE);
	write_file(&temp_path, &bytes, sync)?;
	std::fs::rename(&temp_path, dir.join(JOURNAL_FILE)).map_err(backend_err)
}

fn apply_journal(dir: &Path, journal: &Journal) -> Result<(), StorageError> {
	for (staged, record) in &journal.renames {
		match std::fs::rename(dir.join(staged), dir.join(record)) {
			Ok(()) => {},
			// Moved by an earlier attempt.
			Err(e) if e.kind() == ErrorKind::NotFound => {},
			Err(e) => return Err(backend_err(e)),
		}
	}
	remove_if_present(&dir.join(JOURNAL_FILE))
}

/// Finishes the batch left behind by an interrupted commit, if any.
fn recover(dir: &Path) -> Result<(), StorageError> {
	let bytes = match std::fs::read(dir.join(JOURNAL_FILE)) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
		Err(e) => return Err(backend_err(e)),
	};
	let journal: Journal =
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;
	tracing::warn!(
		records = journal.renames.len(),
		"Completing interrupted storage batch"
	);
	apply_journal(dir, &journal)
}

/// Deletes staged files that never made it into a journal.
fn discard_staged_files(dir: &Path) -> Result<(), StorageError> {
	for entry in std::fs::read_dir(dir).map_err(backend_err)? {
		let path = entry.map_err(backend_err)?.path();
		if path.extension().is_some_and(|ext| ext == TEMP_EXTENSION) {
			tracing::debug!(path = ?path, "Removing staged file");
			remove_if_present(&path)?;
		}
	}
	Ok(())
}

/// Writes a batch of `(digest, record bytes)` pairs.
///
/// Nothing is visible until the journal is written; from then on the batch
/// is applied in full, now or by [`recover`].
fn commit_batch(dir: &Path, records: Vec<(String, Vec<u8>)>, sync: bool) -> Result<(), StorageError> {
	recover(dir)?;

	let mut journal = Journal {
		renames: Vec::with_capacity(records.len()),
	};
	let mut staged = Ok(());
	for (digest, bytes) in &records {
		let staged_name = format!("{}.{}", digest, TEMP_EXTENSION);
		journal
			.renames
			.push((staged_name.clone(), format!("{}.{}", digest, DATA_EXTENSION)));
		staged = write_file(&dir.join(&staged_name), bytes, sync);
		if staged.is_err() {
			break;
		}
	}
	if let Err(e) = staged.and_then(|()| write_journal(dir, &journal, sync)) {
		for (staged_name, _) in &journal.renames {
			if let Err(cleanup) = remove_if_present(&dir.join(staged_name)) {
				tracing::warn!(file = %staged_name, error = %cleanup, "Failed to remove staged file");
			}
		}
		return Err(e);
	}

	apply_journal(dir, &journal)?;
	if sync {
		File::open(dir)
			.and_then(|d| d.sync_all())
			.map_err(backend_err)?;
	}
	Ok(())
}

/// File-based storage implementation.
///
/// Holds an exclusive advisory lock on the storage directory for as long as
/// it is alive, so two processes cannot write to the same directory.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// Whether to fsync each file before it is renamed into place.
	sync_writes: bool,
	/// Readers share it; a batch holds it exclusively until fully applied.
	commit_lock: Arc<RwLock<()>>,
	/// Locked `.lock` file in `base_path`; released on drop.
	_lock: File,
}

impl FileStorage {
	/// Opens (creating if needed) the storage directory and locks it.
	///
	/// Completes a batch interrupted by a crash and removes leftover staged
	/// files before returning.
	pub fn open(base_path: impl Into<PathBuf>, sync_writes: bool) -> Result<Self, StorageError> {
		let base_path = base_path.into();
		std::fs::create_dir_all(&base_path).map_err(backend_err)?;

		let lock_path = base_path.join(LOCK_FILE);
		let lock = OpenOptions::new()
			.create(true)
			.read(true)
			.write(true)
			.truncate(false)
			.open(&lock_path)
			.map_err(backend_err)?;
		match lock.try_lock_exclusive() {
			Ok(()) => {},
			Err(e) if e.kind() == ErrorKind::WouldBlock => {
				return Err(StorageError::Configuration(format!(
					"Storage directory {} is in use by another process",
					base_path.display()
				)));
			},
			Err(e) => return Err(backend_err(e)),
		}

		recover(&base_path)?;
		discard_staged_files(&base_path)?;

		tracing::debug!(path = %base_path.display(), "Opened file storage");
		Ok(Self {
			base_path,
			sync_writes,
			commit_lock: Arc::new(RwLock::new(())),
			_lock: lock,
		})
	}

	fn record_path(&self, key: &str) -> PathBuf {
		self.base_path
			.join(format!("{}.{}", key_digest(key), DATA_EXTENSION))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let _commit = self.commit_lock.read().await;
		let data = match fs::read(self.record_path(key)).await {
			Ok(data) => data,
			Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound),
			Err(e) => return Err(backend_err(e)),
		};

		let (stored_key, value) = decode_record(&data)?;
		if stored_key != key {
			return Err(StorageError::Backend(format!(
				"Record file for {} holds key {}",
				key, stored_key
			)));
		}
		Ok(value.to_vec())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let _commit = self.commit_lock.read().await;
		fs::try_exists(self.record_path(key))
			.await
			.map_err(backend_err)
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let _commit = self.commit_lock.read().await;
		let mut entries = fs::read_dir(&self.base_path).await.map_err(backend_err)?;
		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await.map_err(backend_err)? {
			let path = entry.path();
			if path.extension().is_none_or(|ext| ext != DATA_EXTENSION) {
				continue;
			}
			let data = fs::read(&path).await.map_err(backend_err)?;
			match decode_record(&data) {
				Ok((key, _)) if key.starts_with(prefix) => keys.push(key.to_string()),
				Ok(_) => {},
				Err(e) => {
					tracing::warn!(path = ?path, error = %e, "Skipping unreadable record file");
				},
			}
		}
		keys.sort();
		Ok(keys)
	}

	/// Runs on the blocking pool while holding the commit lock, so the batch
	/// finishes even if the caller stops waiting for it.
	async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<(), StorageError> {
		if ops.is_empty() {
			return Ok(());
		}
		let records = ops
			.iter()
			.map(|op| Ok((key_digest(&op.key), encode_record(&op.key, &op.value)?)))
			.collect::<Result<Vec<_>, StorageError>>()?;

		let guard = Arc::clone(&self.commit_lock).write_owned().await;
		let dir = self.base_path.clone();
		let sync = self.sync_writes;
		tokio::task::spawn_blocking(move || {
			let _commit = guard;
			commit_batch(&dir, records, sync)
		})
		.await
		.map_err(|e| StorageError::Backend(format!("Batch writer failed: {}", e)))?
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some(s) if s.trim().is_empty() => Err("must not be empty".into()),
						_ => Ok(()),
					}
				}),
				Field::new("sync_writes", FieldType::Boolean),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
/// - `sync_writes`: fsync every file before it becomes visible (default: false)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");
	let sync_writes = config
		.get("sync_writes")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);

	Ok(Box::new(FileStorage::open(storage_path, sync_writes)?))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
