//! Loader for configurations split across several files.
//!
//! The main file may name other files in an `include` directive. Every
//! top-level section must come from exactly one file, so merging never has
//! to decide which definition wins.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that handles multi-file configurations with includes.
pub struct ConfigLoader {
	/// Base path for resolving relative includes
	base_path: PathBuf,
	/// Canonical paths already read, to detect circular includes
	loaded_files: HashSet<PathBuf>,
	/// File each top-level section was read from, for error reporting
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and all its includes, then validates the result.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;
		let mut main_toml = self.load_file(&config_path).await?;
		let includes = extract_includes(&main_toml)?;

		if let Some(table) = main_toml.as_table_mut() {
			table.remove("include");
			for key in table.keys() {
				self.section_sources.insert(key.clone(), config_path.clone());
			}
		}

		for include_path in includes {
			let resolved_path = self.resolve_path(&include_path)?;
			let include_toml = self.load_file(&resolved_path).await?;
			if !extract_includes(&include_toml)?.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Nested include in {} is not supported",
					resolved_path.display()
				)));
			}
			self.merge(&mut main_toml, include_toml, &resolved_path)?;
		}

		Config::from_toml(main_toml)
	}

	/// Reads a file, resolves environment variables and parses it as TOML.
	async fn load_file(&mut self, path: &Path) -> Result<toml::Value, ConfigError> {
		let canonical_path = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		let resolved = resolve_env_vars(&content)?;
		Ok(toml::from_str(&resolved)?)
	}

	/// Moves every top-level section of `include` into `main`, rejecting any
	/// section that was already defined.
	fn merge(
		&mut self,
		main: &mut toml::Value,
		include: toml::Value,
		source: &Path,
	) -> Result<(), ConfigError> {
		let (Some(main_table), toml::Value::Table(include_table)) = (main.as_table_mut(), include)
		else {
			return Err(ConfigError::Validation(format!(
				"{} is not a TOML table",
				source.display()
			)));
		};

		for (key, value) in include_table {
			if let Some(existing_source) = self.section_sources.get(&key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					key,
					existing_source.display(),
					source.display()
				)));
			}
			self.section_sources.insert(key.clone(), source.to_path_buf());
			main_table.insert(key, value);
		}
		Ok(())
	}

	/// Resolves a path relative to the base path.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}
		Ok(resolved)
	}
}

/// Extracts the `include` directive, which may be a string or an array of strings.
fn extract_includes(toml: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match toml.get("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const SERVICE: &str = r#"
[service]
id = "fulfillment-test"
"#;

	const STORAGE: &str = r#"
[storage]
primary = "memory"
[storage.implementations.memory]
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(&config_path, format!("{SERVICE}{STORAGE}")).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.service.id, "fulfillment-test");
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();
		let main_config = format!("include = [\"storage.toml\", \"fleet.toml\"]\n{SERVICE}");
		let fleet_config = r#"
[[delivery_persons]]
delivery_person_id = "dp1"
name = "Ana"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), STORAGE).unwrap();
		fs::write(temp_dir.path().join("fleet.toml"), fleet_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.storage.primary, "memory");
		assert_eq!(config.delivery_persons.len(), 1);
	}

	#[tokio::test]
	async fn test_single_string_include() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			format!("include = \"storage.toml\"\n{SERVICE}"),
		)
		.unwrap();
		fs::write(temp_dir.path().join("storage.toml"), STORAGE).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		assert!(loader.load_config("main.toml").await.is_ok());
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();
		let main_config = format!("include = [\"duplicate.toml\"]\n{SERVICE}{STORAGE}");

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), SERVICE).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader
			.load_config("main.toml")
			.await
			.unwrap_err()
			.to_string();
		assert!(error_msg.contains("Duplicate section 'service'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();
		let config = format!("include = [\"self.toml\"]\n{SERVICE}");
		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader
			.load_config("self.toml")
			.await
			.unwrap_err()
			.to_string();
		assert!(error_msg.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			format!("include = [\"nope.toml\"]\n{SERVICE}{STORAGE}"),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}

	#[tokio::test]
	async fn test_from_file_relative_to_config_dir() {
		let temp_dir = TempDir::new().unwrap();
		let nested = temp_dir.path().join("conf");
		fs::create_dir(&nested).unwrap();
		fs::write(
			nested.join("main.toml"),
			format!("include = [\"storage.toml\"]\n{SERVICE}"),
		)
		.unwrap();
		fs::write(nested.join("storage.toml"), STORAGE).unwrap();

		let path = nested.join("main.toml");
		let config = Config::from_file(path.to_str().unwrap()).await.unwrap();
		assert_eq!(config.service.id, "fulfillment-test");
	}
}
