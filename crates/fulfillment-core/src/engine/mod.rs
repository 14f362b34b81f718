//! Assignment engine.
//!
//! Implements the four order operations on top of the registry and the
//! ledger. Operations that touch both orders and delivery persons run in a
//! single storage transaction, so a failure at any step leaves neither
//! record changed and two concurrent assignments can never pick the same
//! delivery person.

use crate::ledger::{LedgerError, OrderLedger};
use crate::registry::{DeliveryPersonRegistry, RegistryError};
use fulfillment_config::Config;
use fulfillment_storage::StorageService;
use fulfillment_types::{truncate_id, DeliveryPersonStatus, GeoPoint, Order, OrderStatus};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

pub mod lifecycle;

/// Errors returned by the order operations.
#[derive(Debug, Error)]
pub enum AssignmentError {
	#[error("No available delivery person found")]
	NoAvailableDeliveryPerson,
	#[error("Order already exists: {0}")]
	DuplicateOrder(String),
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Delivery person not found: {0}")]
	DeliveryPersonNotFound(String),
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	#[error("Invalid location: {0}")]
	InvalidLocation(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<LedgerError> for AssignmentError {
	fn from(e: LedgerError) -> Self {
		match e {
			LedgerError::NotFound(id) => AssignmentError::OrderNotFound(id),
			LedgerError::DuplicateId(id) => AssignmentError::DuplicateOrder(id),
			LedgerError::Storage(msg) => AssignmentError::Storage(msg),
		}
	}
}

impl From<RegistryError> for AssignmentError {
	fn from(e: RegistryError) -> Self {
		match e {
			RegistryError::NotFound(id) => AssignmentError::DeliveryPersonNotFound(id),
			RegistryError::Conflict(id) => {
				AssignmentError::InvalidRequest(format!("delivery person already exists: {id}"))
			},
			RegistryError::InvalidRecord(msg) => AssignmentError::InvalidRequest(msg),
			RegistryError::Storage(msg) => AssignmentError::Storage(msg),
		}
	}
}

fn require_id(field: &str, value: &str) -> Result<(), AssignmentError> {
	if value.trim().is_empty() {
		return Err(AssignmentError::InvalidRequest(format!(
			"{field} cannot be empty"
		)));
	}
	Ok(())
}

/// Coordinates order assignment and status changes.
pub struct AssignmentEngine {
	config: Config,
	storage: Arc<StorageService>,
	registry: DeliveryPersonRegistry,
	ledger: OrderLedger,
}

impl AssignmentEngine {
	pub fn new(config: Config, storage: Arc<StorageService>) -> Self {
		Self {
			registry: DeliveryPersonRegistry::new(Arc::clone(&storage)),
			ledger: OrderLedger::new(Arc::clone(&storage)),
			config,
			storage,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Delivery person registry, for administration.
	pub fn registry(&self) -> &DeliveryPersonRegistry {
		&self.registry
	}

	/// Creates an order and assigns it to the nearest available delivery person.
	///
	/// Distances are measured from `pickup` when given, otherwise from the
	/// configured reference point. On success the order is `ASSIGNED` and the
	/// delivery person is `BUSY`; on failure nothing is written.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn assign_order(
		&self,
		order_id: &str,
		pickup: Option<GeoPoint>,
	) -> Result<Order, AssignmentError> {
		require_id("order_id", order_id)?;
		let reference = match pickup {
			Some(point) => {
				point
					.validate()
					.map_err(|e| AssignmentError::InvalidLocation(e.to_string()))?;
				point
			},
			None => self.config.assignment.reference_point,
		};

		let mut tx = self.storage.begin().await;

		let candidate = match self.registry.find_nearest_available_in(&tx, &reference).await {
			Ok(person) if !person.delivery_person_id.is_empty() => person,
			Ok(_) | Err(RegistryError::NotFound(_)) => {
				tracing::warn!("No available delivery person");
				return Err(AssignmentError::NoAvailableDeliveryPerson);
			},
			Err(e) => return Err(e.into()),
		};

		let order = self
			.ledger
			.create_in(
				&mut tx,
				order_id,
				&candidate.delivery_person_id,
				OrderStatus::Assigned,
			)
			.await?;
		self.registry
			.update_status_in(
				&mut tx,
				&candidate.delivery_person_id,
				DeliveryPersonStatus::Busy,
			)
			.await?;

		tx.commit()
			.await
			.map_err(|e| AssignmentError::Storage(e.to_string()))?;

		tracing::info!(
			delivery_person_id = %candidate.delivery_person_id,
			"Assigned order"
		);
		Ok(order)
	}

	/// Returns the stored order.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn get_order_status(&self, order_id: &str) -> Result<Order, AssignmentError> {
		require_id("order_id", order_id)?;
		let order = self.ledger.get(order_id).await?;
		tracing::debug!(status = %order.status, "Fetched order");
		Ok(order)
	}

	/// Changes an order's status and applies its effect on the delivery person.
	///
	/// `DELIVERED` frees the delivery person and `IN_PROGRESS` marks them
	/// busy; other statuses are stored without side effects.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), status = %status))]
	pub async fn update_order_status(
		&self,
		order_id: &str,
		status: &str,
	) -> Result<Order, AssignmentError> {
		require_id("order_id", order_id)?;
		require_id("status", status)?;
		let status = OrderStatus::from(status);

		let mut tx = self.storage.begin().await;

		let order = self
			.ledger
			.update_status_in(&mut tx, order_id, status.clone())
			.await?;
		// Confirms the linked record exists even when the status has no effect.
		self.registry
			.get_in(&tx, &order.delivery_person_id)
			.await?;

		let availability = match status {
			OrderStatus::Delivered => Some(DeliveryPersonStatus::Available),
			OrderStatus::InProgress => Some(DeliveryPersonStatus::Busy),
			_ => None,
		};
		if let Some(availability) = availability {
			self.registry
				.update_status_in(&mut tx, &order.delivery_person_id, availability)
				.await?;
		}

		tx.commit()
			.await
			.map_err(|e| AssignmentError::Storage(e.to_string()))?;

		tracing::info!(
			delivery_person_id = %order.delivery_person_id,
			delivery_person_status = ?availability,
			"Updated order status"
		);
		Ok(order)
	}

	/// Lists the orders held by a delivery person. Unknown ids yield an empty list.
	#[instrument(skip_all, fields(delivery_person_id = %truncate_id(delivery_person_id)))]
	pub async fn get_orders_by_delivery_person(
		&self,
		delivery_person_id: &str,
	) -> Result<Vec<Order>, AssignmentError> {
		require_id("delivery_person_id", delivery_person_id)?;
		let orders = self
			.ledger
			.list_by_delivery_person(delivery_person_id)
			.await?;
		tracing::debug!(count = orders.len(), "Listed orders");
		Ok(orders)
	}
}
