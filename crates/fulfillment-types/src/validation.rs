//! Configuration validation utilities.
//!
//! Validates raw TOML tables, such as the per-implementation storage
//! sections, before they are handed to a factory. Schemas can be nested to
//! describe inline tables.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// The type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	/// A string value.
	String,
	/// A number with optional inclusive bounds. Integers are accepted.
	Float { min: Option<f64>, max: Option<f64> },
	/// A boolean value.
	Boolean,
	/// A nested table with its own schema.
	Table(Schema),
}

/// Custom validator run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a configuration schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		validate_field_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// A validation schema of required and optional fields.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Fails if the value is not a table, a required field is missing, or any
	/// present field has the wrong type or fails its custom validator.
	/// Fields the schema does not mention are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn type_mismatch(field_name: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(type_mismatch(field_name, "string", value));
			}
		},
		FieldType::Float { min, max } => {
			let number = value
				.as_float()
				.or_else(|| value.as_integer().map(|i| i as f64))
				.ok_or_else(|| type_mismatch(field_name, "number", value))?;

			if !number.is_finite() {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("Value {} is not finite", number),
				});
			}
			if let Some(min_val) = min {
				if number < *min_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is less than minimum {}", number, min_val),
					});
				}
			}
			if let Some(max_val) = max {
				if number > *max_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is greater than maximum {}", number, max_val),
					});
				}
			}
		},
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(type_mismatch(field_name, "boolean", value));
			}
		},
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| match e {
				ValidationError::MissingField(f) => {
					ValidationError::MissingField(format!("{}.{}", field_name, f))
				},
				ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
					field: format!("{}.{}", field_name, field),
					message,
				},
				ValidationError::TypeMismatch {
					field,
					expected,
					actual,
				} => ValidationError::TypeMismatch {
					field: format!("{}.{}", field_name, field),
					expected,
					actual,
				},
			})?;
		},
	}

	Ok(())
}

/// A configuration schema that can validate TOML values.
///
/// Implemented once per pluggable implementation so that each can describe
/// its own configuration table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn point_schema() -> Schema {
		Schema::new(
			vec![Field::new(
				"reference_point",
				FieldType::Table(Schema::new(
					vec![
						Field::new(
							"lat",
							FieldType::Float {
								min: Some(-90.0),
								max: Some(90.0),
							},
						),
						Field::new(
							"lng",
							FieldType::Float {
								min: Some(-180.0),
								max: Some(180.0),
							},
						),
					],
					vec![],
				)),
			)],
			vec![Field::new("label", FieldType::String)],
		)
	}

	#[test]
	fn test_valid_nested_table() {
		let value: toml::Value =
			toml::from_str("reference_point = { lat = 40.7, lng = -74 }").unwrap();
		assert!(point_schema().validate(&value).is_ok());
	}

	#[test]
	fn test_missing_nested_field_is_qualified() {
		let value: toml::Value = toml::from_str("reference_point = { lat = 40.7 }").unwrap();
		let err = point_schema().validate(&value).unwrap_err();
		assert!(
			matches!(&err, ValidationError::MissingField(f) if f == "reference_point.lng"),
			"got {err}"
		);
	}

	#[test]
	fn test_out_of_range_number() {
		let value: toml::Value =
			toml::from_str("reference_point = { lat = 140.0, lng = 0.0 }").unwrap();
		let err = point_schema().validate(&value).unwrap_err();
		assert!(matches!(err, ValidationError::InvalidValue { .. }));
	}

	#[test]
	fn test_optional_field_type_checked_when_present() {
		let value: toml::Value = toml::from_str(
			"label = 7\nreference_point = { lat = 0.0, lng = 0.0 }",
		)
		.unwrap();
		let err = point_schema().validate(&value).unwrap_err();
		assert!(matches!(err, ValidationError::TypeMismatch { .. }));
	}

	#[test]
	fn test_custom_validator() {
		let schema = Schema::new(
			vec![],
			vec![Field::new("sync_writes", FieldType::Boolean).with_validator(|v| {
				if v.as_bool() == Some(true) {
					Ok(())
				} else {
					Err("must be enabled".into())
				}
			})],
		);
		let ok: toml::Value = toml::from_str("sync_writes = true").unwrap();
		let bad: toml::Value = toml::from_str("sync_writes = false").unwrap();
		assert!(schema.validate(&ok).is_ok());
		assert!(schema.validate(&bad).is_err());
	}
}
