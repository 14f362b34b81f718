//! Configuration builder for creating test and development configurations.
//!
//! Produces a `Config` backed by in-memory storage unless told otherwise, so
//! tests can build an engine without touching the filesystem.

use crate::{
	ApiConfig, AssignmentConfig, Config, DeliveryPersonSeed, ServiceConfig, StorageConfig,
};
use fulfillment_types::{DeliveryPersonStatus, GeoPoint};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_config: toml::Value,
	reference_point: GeoPoint,
	api: Option<ApiConfig>,
	delivery_persons: Vec<DeliveryPersonSeed>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			service_id: "test-fulfillment".to_string(),
			storage_primary: "memory".to_string(),
			storage_config: toml::Value::Table(toml::Table::new()),
			reference_point: crate::default_reference_point(),
			api: None,
			delivery_persons: Vec::new(),
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Sets the primary storage implementation and its configuration table.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_config = config;
		self
	}

	pub fn reference_point(mut self, point: GeoPoint) -> Self {
		self.reference_point = point;
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Adds a seed delivery person.
	pub fn delivery_person(
		mut self,
		id: impl Into<String>,
		name: impl Into<String>,
		status: DeliveryPersonStatus,
		location: Option<GeoPoint>,
	) -> Self {
		self.delivery_persons.push(DeliveryPersonSeed {
			delivery_person_id: id.into(),
			name: name.into(),
			status,
			location,
		});
		self
	}

	/// Builds the `Config` with the configured values. No validation is run.
	pub fn build(self) -> Config {
		let mut implementations = HashMap::new();
		implementations.insert(self.storage_primary.clone(), self.storage_config);

		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations,
			},
			assignment: AssignmentConfig {
				reference_point: self.reference_point,
			},
			api: self.api,
			delivery_persons: self.delivery_persons,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_build_is_valid() {
		let config = ConfigBuilder::new()
			.delivery_person("dp1", "Ana", DeliveryPersonStatus::Available, None)
			.build();
		assert!(config.validate().is_ok());
		assert!(config.storage.implementations.contains_key("memory"));
		assert_eq!(config.delivery_persons.len(), 1);
	}
}
