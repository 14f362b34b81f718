//! Configuration module for the fulfillment service.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files and
//! validates that all required values are properly set before any component
//! is built from them.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(feature = "testing")]
pub mod builders;
mod loader;

use fulfillment_types::{
	DeliveryPerson, DeliveryPersonStatus, Field, FieldType, GeoPoint, Schema,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message, not the echoed input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the fulfillment service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for candidate selection.
	#[serde(default)]
	pub assignment: AssignmentConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
	/// Delivery persons registered at startup if not already stored.
	#[serde(default)]
	pub delivery_persons: Vec<DeliveryPersonSeed>,
}

/// Configuration specific to the service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this service instance, used in logs.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for candidate selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssignmentConfig {
	/// Origin for distance ranking when a request carries no pickup point.
	#[serde(default = "default_reference_point")]
	pub reference_point: GeoPoint,
}

impl Default for AssignmentConfig {
	fn default() -> Self {
		Self {
			reference_point: default_reference_point(),
		}
	}
}

/// Returns the default depot location.
pub fn default_reference_point() -> GeoPoint {
	GeoPoint::new(40.748817, -73.985428)
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default = "default_api_enabled")]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Per-request deadline in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request body size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: default_api_enabled(),
			host: default_api_host(),
			port: default_api_port(),
			timeout_seconds: default_api_timeout(),
			max_request_size: default_max_request_size(),
		}
	}
}

fn default_api_enabled() -> bool {
	true
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	50051
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// A delivery person declared in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryPersonSeed {
	pub delivery_person_id: String,
	pub name: String,
	#[serde(default)]
	pub status: DeliveryPersonStatus,
	#[serde(default)]
	pub location: Option<GeoPoint>,
}

impl From<DeliveryPersonSeed> for DeliveryPerson {
	fn from(seed: DeliveryPersonSeed) -> Self {
		DeliveryPerson {
			delivery_person_id: seed.delivery_person_id,
			name: seed.name,
			status: seed.status,
			location: seed.location,
		}
	}
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to bound regex work.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				},
			},
		};
		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

/// Schema for the raw `[assignment]` table.
///
/// Checked before deserialization so out-of-range coordinates are reported
/// with their full field path.
fn assignment_schema() -> Schema {
	let coordinate = |name: &str, bound: f64| {
		Field::new(
			name,
			FieldType::Float {
				min: Some(-bound),
				max: Some(bound),
			},
		)
	};
	Schema::new(
		vec![],
		vec![Field::new(
			"reference_point",
			FieldType::Table(Schema::new(
				vec![coordinate("lat", 90.0), coordinate("lng", 180.0)],
				vec![],
			)),
		)],
	)
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	///
	/// This method supports modular configuration through include directives:
	/// - `include = ["file1.toml", "file2.toml"]` - Include specific files
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = match path_buf.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent,
			_ => Path::new("."),
		};

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Builds a validated `Config` from an already env-resolved TOML document.
	pub(crate) fn from_toml(raw: toml::Value) -> Result<Self, ConfigError> {
		if let Some(assignment) = raw.get("assignment") {
			assignment_schema()
				.validate(assignment)
				.map_err(|e| ConfigError::Validation(format!("assignment: {}", e)))?;
		}
		let config = raw.try_into::<Config>()?;
		config.validate()?;
		Ok(config)
	}

	/// Returns the API configuration, falling back to defaults when the
	/// `[api]` section is absent.
	pub fn api_or_default(&self) -> ApiConfig {
		self.api.clone().unwrap_or_default()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// - Ensures the service ID is not empty
	/// - Checks the primary storage implementation is configured
	/// - Validates the reference point
	/// - Checks API port and request deadline bounds
	/// - Validates delivery person seeds (non-empty unique ids, valid locations)
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		self.assignment
			.reference_point
			.validate()
			.map_err(|e| ConfigError::Validation(format!("assignment.reference_point: {}", e)))?;

		if let Some(api) = &self.api {
			if api.port == 0 {
				return Err(ConfigError::Validation("API port cannot be 0".into()));
			}
			if !(1..=300).contains(&api.timeout_seconds) {
				return Err(ConfigError::Validation(format!(
					"API timeout_seconds must be between 1 and 300, got {}",
					api.timeout_seconds
				)));
			}
		}

		let mut seen = HashSet::new();
		for seed in &self.delivery_persons {
			if seed.delivery_person_id.trim().is_empty() {
				return Err(ConfigError::Validation(
					"Delivery person ID cannot be empty".into(),
				));
			}
			if !seen.insert(seed.delivery_person_id.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Duplicate delivery person '{}'",
					seed.delivery_person_id
				)));
			}
			if let Some(location) = &seed.location {
				location.validate().map_err(|e| {
					ConfigError::Validation(format!(
						"Delivery person '{}': {}",
						seed.delivery_person_id, e
					))
				})?;
			}
		}

		Ok(())
	}
}

/// Parses a TOML string into a validated `Config`.
///
/// Environment variables are resolved first; the `[assignment]` table is
/// checked against its schema before the typed parse.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		Config::from_toml(toml::from_str(&resolved)?)
	}
}
