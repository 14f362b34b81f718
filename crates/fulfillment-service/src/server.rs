//! HTTP server for the fulfillment API.
//!
//! Routes requests to the handlers in `apis`, applying the configured
//! request deadline and body size limit.

use crate::apis::{self, with_deadline};
use axum::{
	extract::{
		rejection::{JsonRejection, PathRejection},
		DefaultBodyLimit, Path, State,
	},
	http::StatusCode,
	response::Json,
	routing::{get, post, put},
	Router,
};
use fulfillment_config::ApiConfig;
use fulfillment_core::AssignmentEngine;
use fulfillment_types::{
	APIError, AssignOrderRequest, AssignOrderResponse, DeliveryPerson, GeoPoint,
	GetOrderStatusResponse, GetOrdersByDeliveryPersonResponse, RegisterDeliveryPersonRequest,
	UpdateOrderStatusRequest, UpdateOrderStatusResponse,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Engine that executes every request.
	pub engine: Arc<AssignmentEngine>,
	/// Deadline applied to each request.
	pub timeout: Duration,
}

impl AppState {
	/// Runs a handler under the request deadline, logging failures.
	async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<Json<T>, APIError>
	where
		F: Future<Output = Result<T, APIError>>,
	{
		match with_deadline(self.timeout, fut).await {
			Ok(body) => Ok(Json(body)),
			Err(e) => {
				tracing::warn!(operation, status = e.status_code(), "Request failed: {}", e);
				Err(e)
			},
		}
	}
}

/// Builds the application router.
pub fn router(state: AppState, max_request_size: usize) -> Router {
	Router::new()
		.route("/health", get(handle_health))
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_assign_order))
				.route("/orders/{order_id}", get(handle_get_order_status))
				.route("/orders/{order_id}/status", put(handle_update_order_status))
				.route(
					"/delivery-persons",
					post(handle_register_delivery_person).get(handle_list_delivery_persons),
				)
				.route("/delivery-persons/{id}", get(handle_get_delivery_person))
				.route(
					"/delivery-persons/{id}/location",
					put(handle_update_location),
				)
				.route(
					"/delivery-persons/{id}/orders",
					get(handle_get_orders_by_delivery_person),
				),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive())
				.layer(DefaultBodyLimit::max(max_request_size)),
		)
		.with_state(state)
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<AssignmentEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let state = AppState {
		engine,
		timeout: Duration::from_secs(api_config.timeout_seconds),
	};
	let app = router(state, api_config.max_request_size);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Fulfillment API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

async fn handle_health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_assign_order(
	State(state): State<AppState>,
	body: Result<Json<AssignOrderRequest>, JsonRejection>,
) -> Result<Json<AssignOrderResponse>, APIError> {
	state
		.run("assign_order", async {
			let request = apis::json_body(body).map_err(apis::order::failed)?;
			apis::order::assign_order(request, &state.engine).await
		})
		.await
}

async fn handle_get_order_status(
	State(state): State<AppState>,
	order_id: Result<Path<String>, PathRejection>,
) -> Result<Json<GetOrderStatusResponse>, APIError> {
	state
		.run("get_order_status", async {
			let order_id = apis::path_param(order_id)?;
			apis::order::get_order_status(&order_id, &state.engine).await
		})
		.await
}

async fn handle_update_order_status(
	State(state): State<AppState>,
	order_id: Result<Path<String>, PathRejection>,
	body: Result<Json<UpdateOrderStatusRequest>, JsonRejection>,
) -> Result<Json<UpdateOrderStatusResponse>, APIError> {
	state
		.run("update_order_status", async {
			let order_id = apis::path_param(order_id)?;
			let request = apis::json_body(body)?;
			apis::order::update_order_status(&order_id, request, &state.engine).await
		})
		.await
}

async fn handle_get_orders_by_delivery_person(
	State(state): State<AppState>,
	id: Result<Path<String>, PathRejection>,
) -> Result<Json<GetOrdersByDeliveryPersonResponse>, APIError> {
	state
		.run("get_orders_by_delivery_person", async {
			let id = apis::path_param(id)?;
			apis::order::get_orders_by_delivery_person(&id, &state.engine).await
		})
		.await
}

async fn handle_register_delivery_person(
	State(state): State<AppState>,
	body: Result<Json<RegisterDeliveryPersonRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DeliveryPerson>), APIError> {
	let person = state
		.run("register_delivery_person", async {
			let request = apis::json_body(body)?;
			apis::delivery_person::register(request, &state.engine).await
		})
		.await?;
	Ok((StatusCode::CREATED, person))
}

async fn handle_list_delivery_persons(
	State(state): State<AppState>,
) -> Result<Json<Vec<DeliveryPerson>>, APIError> {
	state
		.run(
			"list_delivery_persons",
			apis::delivery_person::list(&state.engine),
		)
		.await
}

async fn handle_get_delivery_person(
	State(state): State<AppState>,
	id: Result<Path<String>, PathRejection>,
) -> Result<Json<DeliveryPerson>, APIError> {
	state
		.run("get_delivery_person", async {
			let id = apis::path_param(id)?;
			apis::delivery_person::get(&id, &state.engine).await
		})
		.await
}

async fn handle_update_location(
	State(state): State<AppState>,
	id: Result<Path<String>, PathRejection>,
	body: Result<Json<GeoPoint>, JsonRejection>,
) -> Result<Json<DeliveryPerson>, APIError> {
	state
		.run("update_delivery_person_location", async {
			let id = apis::path_param(id)?;
			let location = apis::json_body(body)?;
			apis::delivery_person::update_location(&id, location, &state.engine).await
		})
		.await
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::{Method, Request};
	use fulfillment_config::builders::ConfigBuilder;
	use fulfillment_storage::implementations::memory::MemoryStorage;
	use fulfillment_storage::StorageService;
	use fulfillment_types::DeliveryPersonStatus;
	use http_body_util::BodyExt;
	use serde_json::{json, Value};
	use tower::ServiceExt;

	async fn app() -> Router {
		let config = ConfigBuilder::new()
			.delivery_person(
				"dp1",
				"Ana",
				DeliveryPersonStatus::Available,
				Some(GeoPoint::new(40.7490, -73.9856)),
			)
			.build();
		let engine = AssignmentEngine::new(
			config,
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
		);
		engine.initialize().await.unwrap();

		let state = AppState {
			engine: Arc::new(engine),
			timeout: Duration::from_secs(5),
		};
		router(state, 1024 * 1024)
	}

	async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let body = body.map(|body| body.to_string()).unwrap_or_default();
		send_raw(app, method, uri, &body).await
	}

	async fn send_raw(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
		let request = Request::builder()
			.method(method)
			.uri(uri)
			.header("content-type", "application/json")
			.body(Body::from(body.to_string()))
			.unwrap();

		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, value)
	}

	#[tokio::test]
	async fn test_health() {
		let app = app().await;
		let (status, body) = send(&app, Method::GET, "/health", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "status": "ok" }));
	}

	#[tokio::test]
	async fn test_order_lifecycle() {
		let app = app().await;

		let (status, body) = send(
			&app,
			Method::POST,
			"/api/orders",
			Some(json!({ "order_id": "order1" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "status": "ASSIGNED" }));

		let (status, body) = send(&app, Method::GET, "/api/orders/order1", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "order_id": "order1", "status": "ASSIGNED" }));

		let (status, body) = send(
			&app,
			Method::PUT,
			"/api/orders/order1/status",
			Some(json!({ "status": "DELIVERED" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "status": "UPDATED" }));

		let (_, body) = send(&app, Method::GET, "/api/delivery-persons/dp1", None).await;
		assert_eq!(body["status"], "AVAILABLE");

		let (status, body) =
			send(&app, Method::GET, "/api/delivery-persons/dp1/orders", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(
			body,
			json!({ "orders": [{ "order_id": "order1", "status": "DELIVERED" }] })
		);
	}

	#[tokio::test]
	async fn test_assign_failures_carry_failed_status() {
		let app = app().await;
		send(
			&app,
			Method::POST,
			"/api/orders",
			Some(json!({ "order_id": "order1" })),
		)
		.await;

		let (status, body) = send(
			&app,
			Method::POST,
			"/api/orders",
			Some(json!({ "order_id": "order2" })),
		)
		.await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"], "NO_AVAILABLE_DELIVERY_PERSON");
		assert_eq!(body["details"]["status"], "FAILED");

		let (status, body) = send(
			&app,
			Method::POST,
			"/api/orders",
			Some(json!({ "order_id": "order1" })),
		)
		.await;
		// No candidate is checked first, so the duplicate id is not reached.
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["details"]["status"], "FAILED");
	}

	#[tokio::test]
	async fn test_invalid_requests() {
		let app = app().await;

		let (status, body) = send(
			&app,
			Method::POST,
			"/api/orders",
			Some(json!({ "order_id": " " })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_REQUEST");

		let (status, body) = send(
			&app,
			Method::POST,
			"/api/orders",
			Some(json!({ "order_id": "o1", "pickup": { "lat": 100.0, "lng": 0.0 } })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_LOCATION");
		assert_eq!(body["details"]["status"], "FAILED");

		let (status, body) = send(
			&app,
			Method::PUT,
			"/api/orders/order1/status",
			Some(json!({ "status": "" })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_REQUEST");
	}

	#[tokio::test]
	async fn test_malformed_bodies_are_json_errors() {
		let app = app().await;

		let (status, body) = send_raw(&app, Method::POST, "/api/orders", "{}").await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_REQUEST");
		assert_eq!(body["details"]["status"], "FAILED");

		let (status, body) = send_raw(&app, Method::POST, "/api/orders", "not json").await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_REQUEST");
		assert_eq!(body["details"]["status"], "FAILED");

		let (status, body) =
			send_raw(&app, Method::PUT, "/api/orders/order1/status", "{\"state\":1}").await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_REQUEST");
		assert!(body.get("details").is_none());

		let (status, body) = send_raw(
			&app,
			Method::PUT,
			"/api/delivery-persons/dp1/location",
			"{\"lat\":\"north\"}",
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_REQUEST");

		// Nothing was assigned along the way.
		let (_, body) = send(&app, Method::GET, "/api/delivery-persons/dp1", None).await;
		assert_eq!(body["status"], "AVAILABLE");
	}

	#[tokio::test]
	async fn test_unknown_order() {
		let app = app().await;
		let (status, body) = send(&app, Method::GET, "/api/orders/missing", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "ORDER_NOT_FOUND");

		let (status, _) = send(
			&app,
			Method::PUT,
			"/api/orders/missing/status",
			Some(json!({ "status": "DELIVERED" })),
		)
		.await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		let (status, body) =
			send(&app, Method::GET, "/api/delivery-persons/nobody/orders", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "orders": [] }));
	}

	#[tokio::test]
	async fn test_delivery_person_administration() {
		let app = app().await;

		let (status, body) = send(
			&app,
			Method::POST,
			"/api/delivery-persons",
			Some(json!({ "delivery_person_id": "dp2", "name": "Ben" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["status"], "AVAILABLE");

		let (status, body) = send(
			&app,
			Method::POST,
			"/api/delivery-persons",
			Some(json!({ "delivery_person_id": "dp2", "name": "Ben" })),
		)
		.await;
		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"], "DUPLICATE_DELIVERY_PERSON");

		let (status, body) = send(
			&app,
			Method::PUT,
			"/api/delivery-persons/dp2/location",
			Some(json!({ "lat": 40.7, "lng": -74.0 })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["location"], json!({ "lat": 40.7, "lng": -74.0 }));

		let (status, _) = send(
			&app,
			Method::PUT,
			"/api/delivery-persons/dp2/location",
			Some(json!({ "lat": 40.7, "lng": -190.0 })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (_, body) = send(&app, Method::GET, "/api/delivery-persons", None).await;
		let ids: Vec<_> = body
			.as_array()
			.unwrap()
			.iter()
			.map(|p| p["delivery_person_id"].as_str().unwrap().to_string())
			.collect();
		assert_eq!(ids, vec!["dp1", "dp2"]);

		let (status, _) = send(&app, Method::GET, "/api/delivery-persons/nobody", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}
}
