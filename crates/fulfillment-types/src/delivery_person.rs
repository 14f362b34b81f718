//! Delivery person records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::GeoPoint;

/// A delivery person who can hold at most one active order at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryPerson {
	/// Unique identifier for this delivery person.
	pub delivery_person_id: String,
	/// Display name.
	pub name: String,
	/// Current availability.
	pub status: DeliveryPersonStatus,
	/// Last known location, if any has been reported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub location: Option<GeoPoint>,
}

impl DeliveryPerson {
	/// Creates an available delivery person with no known location.
	pub fn new(delivery_person_id: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			delivery_person_id: delivery_person_id.into(),
			name: name.into(),
			status: DeliveryPersonStatus::Available,
			location: None,
		}
	}

	/// Sets the last known location.
	pub fn with_location(mut self, location: GeoPoint) -> Self {
		self.location = Some(location);
		self
	}

	/// Sets the availability status.
	pub fn with_status(mut self, status: DeliveryPersonStatus) -> Self {
		self.status = status;
		self
	}

	pub fn is_available(&self) -> bool {
		self.status == DeliveryPersonStatus::Available
	}
}

/// Availability of a delivery person.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryPersonStatus {
	/// Free to take a new order.
	#[default]
	Available,
	/// Holding an active order.
	Busy,
}

impl fmt::Display for DeliveryPersonStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DeliveryPersonStatus::Available => write!(f, "AVAILABLE"),
			DeliveryPersonStatus::Busy => write!(f, "BUSY"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_new_delivery_person_is_available() {
		let person = DeliveryPerson::new("dp123", "John Doe");
		assert!(person.is_available());
		assert!(person.location.is_none());
	}

	#[test]
	fn test_status_wire_format() {
		let json = serde_json::to_string(&DeliveryPersonStatus::Busy).unwrap();
		assert_eq!(json, "\"BUSY\"");
		let parsed: DeliveryPersonStatus = serde_json::from_str("\"AVAILABLE\"").unwrap();
		assert_eq!(parsed, DeliveryPersonStatus::Available);
	}

	#[test]
	fn test_location_is_optional_in_json() {
		let person: DeliveryPerson = serde_json::from_str(
			r#"{"delivery_person_id":"dp1","name":"Ana","status":"BUSY"}"#,
		)
		.unwrap();
		assert_eq!(person.status, DeliveryPersonStatus::Busy);
		assert!(person.location.is_none());
	}
}
