//! Shipment generation and persistence.

mod lock;
pub mod orchestrator;
pub mod persistence;

pub use lock::{KeyGuard, KeyedLocks};
pub use orchestrator::ShipmentGenerator;
pub use persistence::{PersistShipment, ShipmentPersister};
