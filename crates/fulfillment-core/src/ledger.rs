//! Order ledger.
//!
//! Persists order records. Orders are never deleted; after creation only
//! their status (and `updated_at`) changes.

use fulfillment_storage::{StorageError, StorageService, StorageTransaction};
use fulfillment_types::{Order, OrderStatus, StorageKey};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Order already exists: {0}")]
	DuplicateId(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

fn storage_err(e: StorageError) -> LedgerError {
	LedgerError::Storage(e.to_string())
}

const NAMESPACE: &str = StorageKey::Orders.as_str();

/// Current Unix time in seconds.
fn now() -> u64 {
	u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// Persistent ledger of orders.
pub struct OrderLedger {
	storage: Arc<StorageService>,
}

impl OrderLedger {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Creates an order linked to `delivery_person_id`.
	pub async fn create(
		&self,
		order_id: &str,
		delivery_person_id: &str,
		status: OrderStatus,
	) -> Result<Order, LedgerError> {
		let mut tx = self.storage.begin().await;
		let order = self
			.create_in(&mut tx, order_id, delivery_person_id, status)
			.await?;
		tx.commit().await.map_err(storage_err)?;
		Ok(order)
	}

	pub async fn create_in(
		&self,
		tx: &mut StorageTransaction<'_>,
		order_id: &str,
		delivery_person_id: &str,
		status: OrderStatus,
	) -> Result<Order, LedgerError> {
		let order = Order::new(order_id, delivery_person_id, status, now());
		match tx.insert(NAMESPACE, order_id, &order).await {
			Ok(()) => Ok(order),
			Err(StorageError::Conflict(_)) => Err(LedgerError::DuplicateId(order_id.to_string())),
			Err(e) => Err(storage_err(e)),
		}
	}

	/// Gets an order by ID.
	pub async fn get(&self, order_id: &str) -> Result<Order, LedgerError> {
		match self.storage.retrieve(NAMESPACE, order_id).await {
			Ok(order) => Ok(order),
			Err(StorageError::NotFound) => Err(LedgerError::NotFound(order_id.to_string())),
			Err(e) => Err(storage_err(e)),
		}
	}

	pub async fn get_in(
		&self,
		tx: &StorageTransaction<'_>,
		order_id: &str,
	) -> Result<Order, LedgerError> {
		match tx.retrieve(NAMESPACE, order_id).await {
			Ok(order) => Ok(order),
			Err(StorageError::NotFound) => Err(LedgerError::NotFound(order_id.to_string())),
			Err(e) => Err(storage_err(e)),
		}
	}

	/// Sets an order's status and refreshes `updated_at`.
	pub async fn update_status(
		&self,
		order_id: &str,
		status: OrderStatus,
	) -> Result<Order, LedgerError> {
		let mut tx = self.storage.begin().await;
		let order = self.update_status_in(&mut tx, order_id, status).await?;
		tx.commit().await.map_err(storage_err)?;
		Ok(order)
	}

	pub async fn update_status_in(
		&self,
		tx: &mut StorageTransaction<'_>,
		order_id: &str,
		status: OrderStatus,
	) -> Result<Order, LedgerError> {
		let mut order = self.get_in(tx, order_id).await?;
		order.status = status;
		order.updated_at = now().max(order.created_at);
		tx.store(NAMESPACE, order_id, &order).map_err(storage_err)?;
		Ok(order)
	}

	/// Lists the orders linked to a delivery person, oldest first.
	///
	/// Returns an empty list when there are none, including for unknown ids.
	pub async fn list_by_delivery_person(
		&self,
		delivery_person_id: &str,
	) -> Result<Vec<Order>, LedgerError> {
		let orders: Vec<Order> = self.storage.list(NAMESPACE).await.map_err(storage_err)?;
		Ok(select_for(orders, delivery_person_id))
	}
}

fn select_for(orders: Vec<Order>, delivery_person_id: &str) -> Vec<Order> {
	let mut selected: Vec<Order> = orders
		.into_iter()
		.filter(|o| o.delivery_person_id == delivery_person_id)
		.collect();
	selected.sort_by(|a, b| {
		a.created_at
			.cmp(&b.created_at)
			.then_with(|| a.order_id.cmp(&b.order_id))
	});
	selected
}
