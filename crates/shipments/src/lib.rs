//! Shipment generation domain model (pure, no IO).
//!
//! - `package` / `order` / `catalog`: the reference data a generation reads.
//! - `adapter`: the narrow contract every carrier integration implements, plus
//!   the typed registry the orchestrator resolves adapters from.
//! - `shipment` / `label`: what a successful generation persists.
//! - `error`: the generation and printing error taxonomy.
//!
//! Orchestration (repositories, storage, PDF merging) lives in `forgeship-infra`.

pub mod adapter;
pub mod bulk;
pub mod catalog;
pub mod error;
pub mod label;
pub mod order;
pub mod package;
pub mod print;
pub mod shipment;

pub use adapter::{
    AdapterContext, AdapterError, AdapterResult, CarrierAdapter, CarrierRegistry,
    LabelDescriptor, ShipmentPayload,
};
pub use bulk::BulkGenerationReport;
pub use catalog::{CarrierMapping, Company, ShopSender, ShopShippingOptions, TypeShipment};
pub use error::{ErrorKind, GenerationError, LabelPrintError};
pub use label::{
    KeySource, Label, NewLabel, PayloadKind, ResolvedKey, decode_base64_pdf, looks_like_base64,
};
pub use order::{AddressSnapshot, CustomerSnapshot, OrderSnapshot};
pub use package::{Dimensions, InfoPackage};
pub use print::PrintedLabels;
pub use shipment::{Shipment, ShipmentRecord, ShipmentWrite};
