//! Infrastructure layer: repositories, label storage, PDF merging and the
//! services that orchestrate carrier selection and shipment generation.

pub mod cleanup;
pub mod config;
pub mod generation;
pub mod label_storage;
pub mod pdf;
pub mod printing;
pub mod repository;
pub mod rules;


pub use cleanup::{OrphanLabelSweeper, SweepFailure, SweepReport};
pub use config::ShippingConfig;
pub use generation::{PersistShipment, ShipmentGenerator, ShipmentPersister};
pub use label_storage::{FsLabelStorage, InMemoryLabelStorage, LabelStorage, StorageError};
pub use pdf::{PdfMergeError, merge_pdfs, page_count};
pub use printing::LabelPrinter;
pub use repository::Repositories;
pub use rules::{CartPackage, PackagesByAddress, RuleApplier, RuleProvider};
