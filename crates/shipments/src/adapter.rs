//! Carrier adapter contract.
//!
//! Each carrier company is integrated by one [`CarrierAdapter`]. Adapters only
//! see the [`AdapterContext`] they are handed; they never query repositories.
//! Recoverable business outcomes (e.g. an address the carrier rejects) belong in
//! the response payload, not in an `Err`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use forgeship_core::OrderId;

use crate::catalog::{Company, ShopSender, ShopShippingOptions, TypeShipment};
use crate::order::{AddressSnapshot, CustomerSnapshot};
use crate::package::InfoPackage;

/// What the adapter needs to ship one package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentPayload {
    pub info_package: InfoPackage,
    pub customer: CustomerSnapshot,
    pub delivery_address: AddressSnapshot,
    pub sender: Option<ShopSender>,
    pub company: Company,
    pub type_shipment: TypeShipment,
    /// Active shipment types of `company`.
    pub type_shipments: Vec<TypeShipment>,
    /// Whole company catalog (some carriers hand over to partners).
    pub companies: Vec<Company>,
    /// Amount to collect, if the order is cash on delivery.
    pub cash_on_delivery: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterContext {
    pub carrier_code: String,
    pub order_id: OrderId,
    pub order_reference: String,
    /// Idempotency token; the adapter may replace it with the carrier's number.
    pub shipment_number: String,
    pub payload: ShipmentPayload,
    pub options: ShopShippingOptions,
}

/// One label returned by the carrier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDescriptor {
    pub storage_key: Option<String>,
    pub package_id: Option<String>,
    pub tracker_code: Option<String>,
    pub label_type: Option<String>,
    pub pdf_content_base64: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResult {
    pub shipment_number: String,
    pub request_payload: Option<JsonValue>,
    pub response_payload: Option<JsonValue>,
    #[serde(default)]
    pub labels: Vec<LabelDescriptor>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// The carrier refused the request outright.
    #[error("carrier rejected the shipment: {0}")]
    Rejected(String),

    #[error("carrier transport failure: {0}")]
    Transport(String),

    #[error("invalid carrier response: {0}")]
    InvalidResponse(String),
}

pub trait CarrierAdapter: Send + Sync {
    /// Company code this adapter serves (matches `Company::code`).
    fn code(&self) -> &str;

    fn generate_shipment(&self, ctx: &AdapterContext) -> Result<AdapterResult, AdapterError>;
}

/// Typed registry: company code -> adapter. Codes are case-insensitive.
#[derive(Clone, Default)]
pub struct CarrierRegistry {
    adapters: BTreeMap<String, Arc<dyn CarrierAdapter>>,
}

impl CarrierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own code; replaces a previous one.
    pub fn register(&mut self, adapter: Arc<dyn CarrierAdapter>) -> &mut Self {
        self.adapters
            .insert(adapter.code().to_ascii_lowercase(), adapter);
        self
    }

    pub fn with(mut self, adapter: Arc<dyn CarrierAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, code: &str) -> Option<Arc<dyn CarrierAdapter>> {
        self.adapters.get(&code.to_ascii_lowercase()).cloned()
    }

    pub fn codes(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl core::fmt::Debug for CarrierRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CarrierRegistry")
            .field("codes", &self.codes())
            .finish()
    }
}
