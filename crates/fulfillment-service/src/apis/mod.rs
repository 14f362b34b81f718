//! Request handling for the fulfillment HTTP API.
//!
//! Each submodule turns API payloads into engine calls and engine errors
//! into `APIError`s with stable error codes.

pub mod delivery_person;
pub mod order;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Json, Path};
use fulfillment_core::{AssignmentError, RegistryError};
use fulfillment_types::{APIError, GeoPoint};
use std::future::Future;
use std::time::Duration;

/// Seconds a client should wait before retrying a timed-out request.
const RETRY_AFTER_SECONDS: u64 = 1;

/// Runs `fut` under the per-request deadline.
///
/// On expiry the future is dropped, which discards any storage transaction
/// it had open, and a retryable 503 is returned.
pub async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T, APIError>
where
	F: Future<Output = Result<T, APIError>>,
{
	match tokio::time::timeout(timeout, fut).await {
		Ok(result) => result,
		Err(_) => Err(APIError::ServiceUnavailable {
			error_type: "DEADLINE_EXCEEDED".to_string(),
			message: format!("Request exceeded the {}s deadline", timeout.as_secs()),
			retry_after: Some(RETRY_AFTER_SECONDS),
		}),
	}
}

/// Unwraps an extracted JSON body. Malformed bodies become INVALID_REQUEST.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, APIError> {
	body.map(|Json(value)| value)
		.map_err(|rejection| invalid_request(rejection.body_text()))
}

pub(crate) fn path_param(param: Result<Path<String>, PathRejection>) -> Result<String, APIError> {
	param
		.map(|Path(value)| value)
		.map_err(|rejection| invalid_request(rejection.body_text()))
}

/// Rejects blank identifiers before they reach the engine.
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), APIError> {
	if value.trim().is_empty() {
		return Err(invalid_request(format!("{} cannot be empty", field)));
	}
	Ok(())
}

pub(crate) fn validate_location(point: &GeoPoint) -> Result<(), APIError> {
	point.validate().map_err(|e| APIError::BadRequest {
		error_type: "INVALID_LOCATION".to_string(),
		message: e.to_string(),
		details: None,
	})
}

fn invalid_request(message: String) -> APIError {
	APIError::BadRequest {
		error_type: "INVALID_REQUEST".to_string(),
		message,
		details: None,
	}
}

fn not_found(error_type: &str, message: String) -> APIError {
	APIError::NotFound {
		error_type: error_type.to_string(),
		message,
		details: None,
	}
}

fn internal(message: String) -> APIError {
	APIError::InternalServerError {
		error_type: "STORAGE_ERROR".to_string(),
		message,
		details: None,
	}
}

/// Maps an engine error onto its HTTP representation.
pub(crate) fn assignment_error(e: AssignmentError) -> APIError {
	let message = e.to_string();
	match e {
		AssignmentError::NoAvailableDeliveryPerson => APIError::UnprocessableEntity {
			error_type: "NO_AVAILABLE_DELIVERY_PERSON".to_string(),
			message,
			details: None,
		},
		AssignmentError::DuplicateOrder(_) => APIError::Conflict {
			error_type: "DUPLICATE_ORDER".to_string(),
			message,
			details: None,
		},
		AssignmentError::OrderNotFound(_) => not_found("ORDER_NOT_FOUND", message),
		AssignmentError::DeliveryPersonNotFound(_) => {
			not_found("DELIVERY_PERSON_NOT_FOUND", message)
		},
		AssignmentError::InvalidRequest(_) => invalid_request(message),
		AssignmentError::InvalidLocation(_) => APIError::BadRequest {
			error_type: "INVALID_LOCATION".to_string(),
			message,
			details: None,
		},
		AssignmentError::Storage(_) => internal(message),
	}
}

/// Maps a registry error onto its HTTP representation.
pub(crate) fn registry_error(e: RegistryError) -> APIError {
	let message = e.to_string();
	match e {
		RegistryError::NotFound(_) => not_found("DELIVERY_PERSON_NOT_FOUND", message),
		RegistryError::Conflict(_) => APIError::Conflict {
			error_type: "DUPLICATE_DELIVERY_PERSON".to_string(),
			message,
			details: None,
		},
		RegistryError::InvalidRecord(_) => invalid_request(message),
		RegistryError::Storage(_) => internal(message),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn test_deadline_expiry_is_retryable() {
		let result: Result<(), APIError> = with_deadline(Duration::from_secs(2), async {
			tokio::time::sleep(Duration::from_secs(10)).await;
			Ok(())
		})
		.await;

		let err = result.unwrap_err();
		assert_eq!(err.status_code(), 503);
		assert_eq!(err.to_error_response().retry_after, Some(1));
	}

	#[test]
	fn test_error_mapping() {
		let cases = [
			(AssignmentError::NoAvailableDeliveryPerson, 422),
			(AssignmentError::DuplicateOrder("o".into()), 409),
			(AssignmentError::OrderNotFound("o".into()), 404),
			(AssignmentError::DeliveryPersonNotFound("d".into()), 404),
			(AssignmentError::InvalidRequest("x".into()), 400),
			(AssignmentError::InvalidLocation("x".into()), 400),
			(AssignmentError::Storage("x".into()), 500),
		];
		for (err, status) in cases {
			assert_eq!(assignment_error(err).status_code(), status);
		}
		assert_eq!(
			registry_error(RegistryError::Conflict("d".into())).status_code(),
			409
		);
	}
}
