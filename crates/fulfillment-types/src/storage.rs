//! Storage-related types for the fulfillment service.

/// Storage namespaces for the persisted collections.
///
/// Keys are built as `<namespace>:<id>`, so every record of a collection
/// shares the `<namespace>:` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Order records keyed by order id.
	Orders,
	/// Delivery person records keyed by delivery person id.
	DeliveryPersons,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub const fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::DeliveryPersons => "delivery_persons",
		}
	}
}
