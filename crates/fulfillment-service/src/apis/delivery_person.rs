//! Delivery person administration endpoints.

use super::{registry_error, require_non_empty, validate_location};
use fulfillment_core::AssignmentEngine;
use fulfillment_types::{APIError, DeliveryPerson, GeoPoint, RegisterDeliveryPersonRequest};

/// Handles POST /api/delivery-persons.
pub async fn register(
	request: RegisterDeliveryPersonRequest,
	engine: &AssignmentEngine,
) -> Result<DeliveryPerson, APIError> {
	require_non_empty("delivery_person_id", &request.delivery_person_id)?;
	if let Some(location) = &request.location {
		validate_location(location)?;
	}

	let person = DeliveryPerson {
		delivery_person_id: request.delivery_person_id,
		name: request.name,
		status: request.status.unwrap_or_default(),
		location: request.location,
	};
	engine
		.registry()
		.register(person)
		.await
		.map_err(registry_error)
}

/// Handles GET /api/delivery-persons.
pub async fn list(engine: &AssignmentEngine) -> Result<Vec<DeliveryPerson>, APIError> {
	engine.registry().list().await.map_err(registry_error)
}

/// Handles GET /api/delivery-persons/{id}.
pub async fn get(id: &str, engine: &AssignmentEngine) -> Result<DeliveryPerson, APIError> {
	require_non_empty("delivery_person_id", id)?;
	engine.registry().get(id).await.map_err(registry_error)
}

/// Handles PUT /api/delivery-persons/{id}/location.
pub async fn update_location(
	id: &str,
	location: GeoPoint,
	engine: &AssignmentEngine,
) -> Result<DeliveryPerson, APIError> {
	require_non_empty("delivery_person_id", id)?;
	validate_location(&location)?;
	engine
		.registry()
		.update_location(id, location)
		.await
		.map_err(registry_error)
}
