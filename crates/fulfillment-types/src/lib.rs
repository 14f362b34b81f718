//! Common types module for the fulfillment service.
//!
//! This module defines the domain records, API payloads, and configuration
//! validation helpers shared by every crate in the workspace.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Delivery person records and availability states.
pub mod delivery_person;
/// Geographic points and the distance primitive used for candidate ranking.
pub mod geo;
/// Order records and the order status lifecycle.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage types for managing persistent data.
pub mod storage;
/// Utility functions for log formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use api::*;
pub use delivery_person::*;
pub use geo::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::truncate_id;
pub use validation::*;
