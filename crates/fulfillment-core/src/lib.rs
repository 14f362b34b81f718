//! Core assignment logic for the fulfillment service.
//!
//! Ties the delivery person registry and the order ledger together into the
//! assignment engine, and provides the builder that wires an engine to a
//! configured storage backend.

pub mod builder;
pub mod engine;
pub mod ledger;
pub mod registry;

pub use builder::{BuilderError, EngineBuilder, EngineFactories};
pub use engine::{AssignmentEngine, AssignmentError};
pub use ledger::{LedgerError, OrderLedger};
pub use registry::{DeliveryPersonRegistry, RegistryError};
