//! Factory registry for pluggable implementations.
//!
//! Collects the factory of every storage backend so the engine can be built
//! from whichever one the configuration names.

use fulfillment_config::Config;
use fulfillment_core::{AssignmentEngine, BuilderError, EngineBuilder, EngineFactories};
use fulfillment_storage::StorageFactory;
use std::collections::HashMap;

/// Registry of storage factories keyed by implementation name.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
}

impl FactoryRegistry {
	/// Creates a registry holding every built-in implementation.
	pub fn with_defaults() -> Self {
		let mut registry = Self {
			storage: HashMap::new(),
		};
		for (name, factory) in fulfillment_storage::get_all_implementations() {
			registry.register_storage(name, factory);
		}
		registry
	}

	/// Registers a storage implementation.
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	/// Builds the engine described by `config`.
	pub fn build_engine(self, config: Config) -> Result<AssignmentEngine, BuilderError> {
		EngineBuilder::new(config).build(EngineFactories {
			storage_factories: self.storage,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_config::builders::ConfigBuilder;

	#[test]
	fn test_defaults_cover_builtin_backends() {
		let registry = FactoryRegistry::with_defaults();
		assert!(registry.storage.contains_key("memory"));
		assert!(registry.storage.contains_key("file"));
		assert!(registry.build_engine(ConfigBuilder::new().build()).is_ok());
	}
}
