//! API types for the fulfillment HTTP endpoints.
//!
//! Request and response bodies for the four order operations, the delivery
//! person administration routes, and the structured error payload shared by
//! all of them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DeliveryPersonStatus, GeoPoint, Order, OrderStatus};

/// Request body for assigning a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignOrderRequest {
	/// Identifier of the order to create.
	pub order_id: String,
	/// Pickup location to rank candidates against. The configured depot is
	/// used when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pickup: Option<GeoPoint>,
}

/// Outcome reported by an assignment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
	Assigned,
	Failed,
}

/// Response body for a successful assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignOrderResponse {
	pub status: AssignmentStatus,
}

/// Response body for an order status lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOrderStatusResponse {
	pub order_id: String,
	pub status: OrderStatus,
}

/// Request body for an order status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
	pub status: String,
}

/// Response body for a successful status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusResponse {
	pub status: String,
}

impl UpdateOrderStatusResponse {
	pub const UPDATED: &'static str = "UPDATED";

	pub fn updated() -> Self {
		Self {
			status: Self::UPDATED.to_string(),
		}
	}
}

/// An order as listed for a delivery person.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
	pub order_id: String,
	pub status: OrderStatus,
}

impl From<Order> for OrderSummary {
	fn from(order: Order) -> Self {
		Self {
			order_id: order.order_id,
			status: order.status,
		}
	}
}

/// Response body listing the orders held by one delivery person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOrdersByDeliveryPersonResponse {
	pub orders: Vec<OrderSummary>,
}

/// Request body for registering a delivery person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDeliveryPersonRequest {
	pub delivery_person_id: String,
	pub name: String,
	/// Initial availability, `AVAILABLE` when absent.
	#[serde(default)]
	pub status: Option<DeliveryPersonStatus>,
	#[serde(default)]
	pub location: Option<GeoPoint>,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed or invalid request (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Referenced record does not exist (404)
	NotFound {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Record already exists (409)
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Request is valid but cannot be satisfied right now (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Deadline expired or dependency unavailable; safe to retry (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Storage or other internal failure (500)
	InternalServerError {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Attaches detail context to the error, replacing any previous details.
	/// Has no effect on `ServiceUnavailable`, which carries a retry hint instead.
	pub fn with_details(mut self, value: serde_json::Value) -> Self {
		match &mut self {
			APIError::BadRequest { details, .. }
			| APIError::NotFound { details, .. }
			| APIError::Conflict { details, .. }
			| APIError::UnprocessableEntity { details, .. }
			| APIError::InternalServerError { details, .. } => *details = Some(value),
			APIError::ServiceUnavailable { .. } => {},
		}
		self
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::NotFound {
				error_type,
				message,
				details,
			}
			| APIError::Conflict {
				error_type,
				message,
				details,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			}
			| APIError::InternalServerError {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
				retry_after: None,
			},
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
				retry_after: *retry_after,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
