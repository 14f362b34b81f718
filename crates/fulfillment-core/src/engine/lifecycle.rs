//! Lifecycle management for the assignment engine.
//!
//! Handles startup seeding of configured delivery persons and shutdown.

use super::{AssignmentEngine, AssignmentError};
use crate::registry::RegistryError;
use fulfillment_types::DeliveryPerson;

impl AssignmentEngine {
	/// Registers configured delivery persons that are not stored yet.
	///
	/// Existing records are left as they are, so restarts never reset a
	/// delivery person's availability. Returns the number of records added.
	pub async fn initialize(&self) -> Result<usize, AssignmentError> {
		tracing::info!(service_id = %self.config.service.id, "Initializing assignment engine");

		let mut tx = self.storage.begin().await;
		let mut seeded = 0;
		for seed in &self.config.delivery_persons {
			let person = DeliveryPerson::from(seed.clone());
			match self.registry.register_in(&mut tx, person).await {
				Ok(_) => seeded += 1,
				Err(RegistryError::Conflict(id)) => {
					tracing::debug!(delivery_person_id = %id, "Delivery person already stored");
				},
				Err(e) => return Err(e.into()),
			}
		}
		tx.commit()
			.await
			.map_err(|e| AssignmentError::Storage(e.to_string()))?;

		tracing::info!(seeded, "Seeded delivery persons");
		Ok(seeded)
	}

	/// Performs cleanup operations.
	pub async fn shutdown(&self) -> Result<(), AssignmentError> {
		tracing::info!(service_id = %self.config.service.id, "Shutting down assignment engine");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use crate::engine::AssignmentEngine;
	use fulfillment_config::builders::ConfigBuilder;
	use fulfillment_storage::implementations::memory::MemoryStorage;
	use fulfillment_storage::StorageService;
	use fulfillment_types::{DeliveryPersonStatus, GeoPoint};
	use std::sync::Arc;

	#[tokio::test]
	async fn test_initialize_seeds_once_without_overwriting() {
		let config = ConfigBuilder::new()
			.delivery_person(
				"dp1",
				"Ana",
				DeliveryPersonStatus::Available,
				Some(GeoPoint::new(40.75, -73.99)),
			)
			.delivery_person("dp2", "Ben", DeliveryPersonStatus::Busy, None)
			.build();
		let engine = AssignmentEngine::new(
			config,
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
		);

		assert_eq!(engine.initialize().await.unwrap(), 2);
		assert_eq!(
			engine.registry().get("dp2").await.unwrap().status,
			DeliveryPersonStatus::Busy
		);

		engine.assign_order("order1", None).await.unwrap();
		assert_eq!(engine.initialize().await.unwrap(), 0);
		// The assignment survived the second seeding pass.
		assert_eq!(
			engine.registry().get("dp1").await.unwrap().status,
			DeliveryPersonStatus::Busy
		);

		engine.shutdown().await.unwrap();
	}
}
