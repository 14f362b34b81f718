//! Builder for constructing assignment engines.
//!
//! Composes an `AssignmentEngine` from configuration and a set of storage
//! factories, so the storage backend is chosen by name at startup.

use crate::engine::AssignmentEngine;
use fulfillment_config::Config;
use fulfillment_storage::{StorageError, StorageInterface, StorageService};
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

/// Factory functions needed to build an `AssignmentEngine`, keyed by
/// implementation name.
pub struct EngineFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builder for constructing an `AssignmentEngine` with a pluggable backend.
pub struct EngineBuilder {
	config: Config,
}

impl EngineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine using the factory registered for the primary storage.
	///
	/// Only the primary implementation is constructed; the others are
	/// validated by their factories when they become primary.
	pub fn build<SF>(self, factories: EngineFactories<SF>) -> Result<AssignmentEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let primary = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary storage '{}' not found in implementations",
					primary
				))
			})?;
		let factory = factories.storage_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("storage implementation '{}'", primary))
		})?;

		let backend = factory(storage_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				primary, e
			))
		})?;
		tracing::info!(component = "storage", implementation = %primary, "Loaded");

		for name in self.config.storage.implementations.keys() {
			if name != primary {
				tracing::debug!(component = "storage", implementation = %name, "Skipped non-primary");
			}
		}

		let storage = Arc::new(StorageService::new(backend));
		Ok(AssignmentEngine::new(self.config, storage))
	}
}
