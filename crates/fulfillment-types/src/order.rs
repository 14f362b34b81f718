//! Order records for the fulfillment service.
//!
//! An order is created at assignment time, already linked to a delivery
//! person, and afterwards only its status changes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A delivery order tracked through its status lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
	/// Unique identifier for this order.
	pub order_id: String,
	/// Delivery person the order is assigned to.
	pub delivery_person_id: String,
	/// Current status of the order.
	pub status: OrderStatus,
	/// Unix timestamp (seconds) when the order was created.
	pub created_at: u64,
	/// Unix timestamp (seconds) when the order was last updated.
	pub updated_at: u64,
}

impl Order {
	/// Creates a new order record stamped with `now` for both timestamps.
	pub fn new(
		order_id: impl Into<String>,
		delivery_person_id: impl Into<String>,
		status: OrderStatus,
		now: u64,
	) -> Self {
		Self {
			order_id: order_id.into(),
			delivery_person_id: delivery_person_id.into(),
			status,
			created_at: now,
			updated_at: now,
		}
	}
}

/// Status of an order.
///
/// The three well-known states drive delivery person availability. Any other
/// status string is accepted and stored verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
	/// Order has been linked to a delivery person.
	Assigned,
	/// Delivery person is on the way.
	InProgress,
	/// Order has been handed over.
	Delivered,
	/// Any status outside the well-known lifecycle.
	Other(String),
}

impl OrderStatus {
	pub const ASSIGNED: &'static str = "ASSIGNED";
	pub const IN_PROGRESS: &'static str = "IN_PROGRESS";
	pub const DELIVERED: &'static str = "DELIVERED";

	/// Returns the wire representation of the status.
	pub fn as_str(&self) -> &str {
		match self {
			OrderStatus::Assigned => Self::ASSIGNED,
			OrderStatus::InProgress => Self::IN_PROGRESS,
			OrderStatus::Delivered => Self::DELIVERED,
			OrderStatus::Other(s) => s,
		}
	}
}

impl From<String> for OrderStatus {
	fn from(s: String) -> Self {
		match s.as_str() {
			Self::ASSIGNED => OrderStatus::Assigned,
			Self::IN_PROGRESS => OrderStatus::InProgress,
			Self::DELIVERED => OrderStatus::Delivered,
			_ => OrderStatus::Other(s),
		}
	}
}

impl From<&str> for OrderStatus {
	fn from(s: &str) -> Self {
		OrderStatus::from(s.to_string())
	}
}

impl From<OrderStatus> for String {
	fn from(status: OrderStatus) -> Self {
		match status {
			OrderStatus::Other(s) => s,
			known => known.as_str().to_string(),
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_known_statuses_parse() {
		assert_eq!(OrderStatus::from("ASSIGNED"), OrderStatus::Assigned);
		assert_eq!(OrderStatus::from("IN_PROGRESS"), OrderStatus::InProgress);
		assert_eq!(OrderStatus::from("DELIVERED"), OrderStatus::Delivered);
	}

	#[test]
	fn test_unknown_status_is_kept_verbatim() {
		let status = OrderStatus::from("RETURNED_TO_SENDER");
		assert_eq!(status, OrderStatus::Other("RETURNED_TO_SENDER".into()));
		assert_eq!(status.to_string(), "RETURNED_TO_SENDER");
	}

	#[test]
	fn test_status_matching_is_case_sensitive() {
		assert_eq!(
			OrderStatus::from("delivered"),
			OrderStatus::Other("delivered".into())
		);
	}

	#[test]
	fn test_order_serializes_status_as_plain_string() {
		let order = Order::new("order1", "dp1", OrderStatus::InProgress, 1_622_547_800);
		let json = serde_json::to_value(&order).unwrap();
		assert_eq!(json["status"], "IN_PROGRESS");
		assert_eq!(json["delivery_person_id"], "dp1");
		assert_eq!(json["created_at"], json["updated_at"]);

		let back: Order = serde_json::from_value(json).unwrap();
		assert_eq!(back, order);
	}
}
