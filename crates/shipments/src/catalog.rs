//! Carrier catalog: companies, their shipment types, and how platform carriers
//! map onto them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use forgeship_core::{CarrierId, CompanyId, ShopId, TypeShipmentId};

use crate::order::AddressSnapshot;

/// A carrier company; `code` selects its adapter in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub code: String,
    pub active: bool,
}

/// A service offered by a company (e.g. "24h", "economy").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeShipment {
    pub id: TypeShipmentId,
    pub company_id: CompanyId,
    pub name: String,
    pub code: String,
    pub active: bool,
}

/// Links a platform carrier (by reference id) to a company shipment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierMapping {
    pub reference_id: CarrierId,
    pub type_shipment_id: TypeShipmentId,
}

/// Sender details of a shop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopSender {
    pub shop_id: Option<ShopId>,
    pub name: String,
    pub email: Option<String>,
    pub address: AddressSnapshot,
}

/// Shop-level shipping configuration handed to adapters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopShippingOptions {
    /// Payment module whose orders are cash on delivery.
    pub cod_module: Option<String>,
    /// Prefix carriers print on labels.
    pub label_prefix: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}
