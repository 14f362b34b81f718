//! Delivery person registry.
//!
//! Reads and writes delivery person records and selects the nearest
//! available one for an assignment. Every operation comes in two forms: one
//! that runs in its own storage transaction, and an `_in` form that joins a
//! transaction owned by the caller so several steps commit together.

use fulfillment_storage::{StorageError, StorageService, StorageTransaction};
use fulfillment_types::{
	DeliveryPerson, DeliveryPersonStatus, GeoError, GeoPoint, StorageKey,
};
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("Delivery person not found: {0}")]
	NotFound(String),
	#[error("Delivery person already exists: {0}")]
	Conflict(String),
	#[error("Invalid delivery person record: {0}")]
	InvalidRecord(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<GeoError> for RegistryError {
	fn from(e: GeoError) -> Self {
		RegistryError::InvalidRecord(e.to_string())
	}
}

fn storage_err(e: StorageError) -> RegistryError {
	RegistryError::Storage(e.to_string())
}

const NAMESPACE: &str = StorageKey::DeliveryPersons.as_str();

/// Orders candidates for assignment: located candidates by ascending distance
/// to `reference`, then candidates without a location, with ties broken by id.
pub fn rank_candidates(candidates: &mut [DeliveryPerson], reference: &GeoPoint) {
	let distance = |p: &DeliveryPerson| p.location.map(|l| l.distance_to(reference));
	candidates.sort_by(|a, b| {
		let by_distance = match (distance(a), distance(b)) {
			(Some(da), Some(db)) => da.total_cmp(&db),
			(Some(_), None) => Ordering::Less,
			(None, Some(_)) => Ordering::Greater,
			(None, None) => Ordering::Equal,
		};
		by_distance.then_with(|| a.delivery_person_id.cmp(&b.delivery_person_id))
	});
}

/// Persistent registry of delivery persons.
pub struct DeliveryPersonRegistry {
	storage: Arc<StorageService>,
}

impl DeliveryPersonRegistry {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Gets a delivery person by ID.
	pub async fn get(&self, id: &str) -> Result<DeliveryPerson, RegistryError> {
		match self.storage.retrieve(NAMESPACE, id).await {
			Ok(person) => Ok(person),
			Err(StorageError::NotFound) => Err(RegistryError::NotFound(id.to_string())),
			Err(e) => Err(storage_err(e)),
		}
	}

	pub async fn get_in(
		&self,
		tx: &StorageTransaction<'_>,
		id: &str,
	) -> Result<DeliveryPerson, RegistryError> {
		match tx.retrieve(NAMESPACE, id).await {
			Ok(person) => Ok(person),
			Err(StorageError::NotFound) => Err(RegistryError::NotFound(id.to_string())),
			Err(e) => Err(storage_err(e)),
		}
	}

	/// Lists every delivery person, ordered by ID.
	pub async fn list(&self) -> Result<Vec<DeliveryPerson>, RegistryError> {
		self.storage.list(NAMESPACE).await.map_err(storage_err)
	}

	pub async fn list_in(
		&self,
		tx: &StorageTransaction<'_>,
	) -> Result<Vec<DeliveryPerson>, RegistryError> {
		tx.list(NAMESPACE).await.map_err(storage_err)
	}

	/// Returns the available delivery person ranked first relative to `reference`.
	pub async fn find_nearest_available(
		&self,
		reference: &GeoPoint,
	) -> Result<DeliveryPerson, RegistryError> {
		let tx = self.storage.begin().await;
		self.find_nearest_available_in(&tx, reference).await
	}

	pub async fn find_nearest_available_in(
		&self,
		tx: &StorageTransaction<'_>,
		reference: &GeoPoint,
	) -> Result<DeliveryPerson, RegistryError> {
		let mut candidates: Vec<DeliveryPerson> = self
			.list_in(tx)
			.await?
			.into_iter()
			.filter(DeliveryPerson::is_available)
			.collect();
		rank_candidates(&mut candidates, reference);

		tracing::debug!(
			candidates = candidates.len(),
			lat = reference.lat,
			lng = reference.lng,
			"Ranked available delivery persons"
		);
		candidates
			.into_iter()
			.next()
			.ok_or_else(|| RegistryError::NotFound("no available delivery person".into()))
	}

	/// Sets a delivery person's availability, returning the updated record.
	pub async fn update_status(
		&self,
		id: &str,
		status: DeliveryPersonStatus,
	) -> Result<DeliveryPerson, RegistryError> {
		let mut tx = self.storage.begin().await;
		let person = self.update_status_in(&mut tx, id, status).await?;
		tx.commit().await.map_err(storage_err)?;
		Ok(person)
	}

	pub async fn update_status_in(
		&self,
		tx: &mut StorageTransaction<'_>,
		id: &str,
		status: DeliveryPersonStatus,
	) -> Result<DeliveryPerson, RegistryError> {
		let mut person = self.get_in(tx, id).await?;
		person.status = status;
		tx.store(NAMESPACE, id, &person).map_err(storage_err)?;
		Ok(person)
	}

	/// Registers a new delivery person.
	pub async fn register(&self, person: DeliveryPerson) -> Result<DeliveryPerson, RegistryError> {
		let mut tx = self.storage.begin().await;
		let person = self.register_in(&mut tx, person).await?;
		tx.commit().await.map_err(storage_err)?;
		tracing::info!(
			delivery_person_id = %person.delivery_person_id,
			status = %person.status,
			"Registered delivery person"
		);
		Ok(person)
	}

	pub async fn register_in(
		&self,
		tx: &mut StorageTransaction<'_>,
		person: DeliveryPerson,
	) -> Result<DeliveryPerson, RegistryError> {
		if person.delivery_person_id.trim().is_empty() {
			return Err(RegistryError::InvalidRecord(
				"delivery_person_id cannot be empty".into(),
			));
		}
		if let Some(location) = &person.location {
			location.validate()?;
		}

		match tx
			.insert(NAMESPACE, &person.delivery_person_id, &person)
			.await
		{
			Ok(()) => Ok(person),
			Err(StorageError::Conflict(_)) => {
				Err(RegistryError::Conflict(person.delivery_person_id))
			},
			Err(e) => Err(storage_err(e)),
		}
	}

	/// Records a new last known location.
	pub async fn update_location(
		&self,
		id: &str,
		location: GeoPoint,
	) -> Result<DeliveryPerson, RegistryError> {
		let mut tx = self.storage.begin().await;
		let person = self.update_location_in(&mut tx, id, location).await?;
		tx.commit().await.map_err(storage_err)?;
		tracing::debug!(delivery_person_id = %id, "Updated delivery person location");
		Ok(person)
	}

	pub async fn update_location_in(
		&self,
		tx: &mut StorageTransaction<'_>,
		id: &str,
		location: GeoPoint,
	) -> Result<DeliveryPerson, RegistryError> {
		location.validate()?;
		let mut person = self.get_in(tx, id).await?;
		person.location = Some(location);
		tx.store(NAMESPACE, id, &person).map_err(storage_err)?;
		Ok(person)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_storage::implementations::memory::MemoryStorage;

	fn registry() -> DeliveryPersonRegistry {
		DeliveryPersonRegistry::new(Arc::new(StorageService::new(Box::new(
			MemoryStorage::new(),
		))))
	}

	const DEPOT: GeoPoint = GeoPoint::new(40.748817, -73.985428);

	fn person(id: &str, location: Option<(f64, f64)>) -> DeliveryPerson {
		let p = DeliveryPerson::new(id, format!("Person {id}"));
		match location {
			Some((lat, lng)) => p.with_location(GeoPoint::new(lat, lng)),
			None => p,
		}
	}

	#[test]
	fn test_ranking_puts_unlocated_last_and_breaks_ties_by_id() {
		let mut candidates = vec![
			person("z-none", None),
			person("far", Some((40.80, -73.95))),
			person("b-near", Some((40.7489, -73.9855))),
			person("a-none", None),
			person("a-near", Some((40.7489, -73.9855))),
		];
		rank_candidates(&mut candidates, &DEPOT);

		let ids: Vec<_> = candidates
			.iter()
			.map(|p| p.delivery_person_id.as_str())
			.collect();
		assert_eq!(ids, vec!["a-near", "b-near", "far", "a-none", "z-none"]);
	}

	#[tokio::test]
	async fn test_find_nearest_skips_busy() {
		let registry = registry();
		registry
			.register(person("close", Some((40.7488, -73.9854))).with_status(DeliveryPersonStatus::Busy))
			.await
			.unwrap();
		registry
			.register(person("further", Some((40.76, -73.98))))
			.await
			.unwrap();

		let nearest = registry.find_nearest_available(&DEPOT).await.unwrap();
		assert_eq!(nearest.delivery_person_id, "further");
	}

	#[tokio::test]
	async fn test_find_nearest_with_none_available() {
		let registry = registry();
		let err = registry.find_nearest_available(&DEPOT).await.unwrap_err();
		assert!(matches!(err, RegistryError::NotFound(_)));
	}

	#[tokio::test]
	async fn test_register_rejects_duplicates_and_invalid_records() {
		let registry = registry();
		registry.register(person("dp1", None)).await.unwrap();

		let err = registry.register(person("dp1", None)).await.unwrap_err();
		assert!(matches!(err, RegistryError::Conflict(id) if id == "dp1"));

		let err = registry.register(person(" ", None)).await.unwrap_err();
		assert!(matches!(err, RegistryError::InvalidRecord(_)));

		let err = registry
			.register(person("dp2", Some((95.0, 0.0))))
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::InvalidRecord(_)));
	}

	#[tokio::test]
	async fn test_update_status_and_location() {
		let registry = registry();
		registry.register(person("dp1", None)).await.unwrap();

		let updated = registry
			.update_status("dp1", DeliveryPersonStatus::Busy)
			.await
			.unwrap();
		assert_eq!(updated.status, DeliveryPersonStatus::Busy);

		let moved = registry
			.update_location("dp1", GeoPoint::new(1.0, 2.0))
			.await
			.unwrap();
		assert_eq!(moved.location, Some(GeoPoint::new(1.0, 2.0)));
		assert_eq!(moved.status, DeliveryPersonStatus::Busy);
		assert_eq!(registry.get("dp1").await.unwrap(), moved);

		let err = registry
			.update_status("missing", DeliveryPersonStatus::Available)
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::NotFound(_)));
	}

	#[tokio::test]
	async fn test_list_is_ordered_by_id() {
		let registry = registry();
		for id in ["dp3", "dp1", "dp2"] {
			registry.register(person(id, None)).await.unwrap();
		}
		let ids: Vec<_> = registry
			.list()
			.await
			.unwrap()
			.into_iter()
			.map(|p| p.delivery_person_id)
			.collect();
		assert_eq!(ids, vec!["dp1", "dp2", "dp3"]);
	}
}
