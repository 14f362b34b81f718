//! Order endpoints.
//!
//! Implements the four order operations: assignment, status lookup, status
//! change, and listing by delivery person.

use super::{assignment_error, require_non_empty, validate_location};
use fulfillment_core::AssignmentEngine;
use fulfillment_types::{
	truncate_id, APIError, AssignOrderRequest, AssignOrderResponse, AssignmentStatus,
	GetOrderStatusResponse, GetOrdersByDeliveryPersonResponse, OrderSummary,
	UpdateOrderStatusRequest, UpdateOrderStatusResponse,
};
use tracing::info;

/// Marks an AssignOrder error with the `FAILED` assignment status.
pub(crate) fn failed(e: APIError) -> APIError {
	e.with_details(serde_json::json!({ "status": AssignmentStatus::Failed }))
}

/// Handles POST /api/orders.
///
/// Failures carry the `FAILED` assignment status in the error details.
pub async fn assign_order(
	request: AssignOrderRequest,
	engine: &AssignmentEngine,
) -> Result<AssignOrderResponse, APIError> {
	require_non_empty("order_id", &request.order_id).map_err(failed)?;
	if let Some(pickup) = &request.pickup {
		validate_location(pickup).map_err(failed)?;
	}

	let order = engine
		.assign_order(&request.order_id, request.pickup)
		.await
		.map_err(|e| failed(assignment_error(e)))?;

	info!(
		order_id = %truncate_id(&order.order_id),
		delivery_person_id = %order.delivery_person_id,
		"Order assigned"
	);
	Ok(AssignOrderResponse {
		status: AssignmentStatus::Assigned,
	})
}

/// Handles GET /api/orders/{order_id}.
pub async fn get_order_status(
	order_id: &str,
	engine: &AssignmentEngine,
) -> Result<GetOrderStatusResponse, APIError> {
	require_non_empty("order_id", order_id)?;
	let order = engine
		.get_order_status(order_id)
		.await
		.map_err(assignment_error)?;
	Ok(GetOrderStatusResponse {
		order_id: order.order_id,
		status: order.status,
	})
}

/// Handles PUT /api/orders/{order_id}/status.
pub async fn update_order_status(
	order_id: &str,
	request: UpdateOrderStatusRequest,
	engine: &AssignmentEngine,
) -> Result<UpdateOrderStatusResponse, APIError> {
	require_non_empty("order_id", order_id)?;
	require_non_empty("status", &request.status)?;
	engine
		.update_order_status(order_id, &request.status)
		.await
		.map_err(assignment_error)?;
	Ok(UpdateOrderStatusResponse::updated())
}

/// Handles GET /api/delivery-persons/{delivery_person_id}/orders.
pub async fn get_orders_by_delivery_person(
	delivery_person_id: &str,
	engine: &AssignmentEngine,
) -> Result<GetOrdersByDeliveryPersonResponse, APIError> {
	require_non_empty("delivery_person_id", delivery_person_id)?;
	let orders = engine
		.get_orders_by_delivery_person(delivery_person_id)
		.await
		.map_err(assignment_error)?;
	Ok(GetOrdersByDeliveryPersonResponse {
		orders: orders.into_iter().map(OrderSummary::from).collect(),
	})
}
