use serde::{Deserialize, Serialize};

use forgeship_core::{CarrierId, OrderId, ShopId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub company: Option<String>,
    pub address1: String,
    pub address2: Option<String>,
    pub postcode: String,
    pub city: String,
    /// ISO 3166-1 alpha-2.
    pub country_iso: String,
    pub phone: Option<String>,
}

/// Read-only view of the order a package ships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub reference: String,
    pub shop_id: ShopId,
    /// Reference id of the carrier picked at checkout.
    pub carrier_reference_id: Option<CarrierId>,
    pub payment_module: String,
    pub total_paid: f64,
    pub customer: CustomerSnapshot,
    pub delivery_address: AddressSnapshot,
}

impl OrderSnapshot {
    pub fn paid_with(&self, module: &str) -> bool {
        !module.is_empty() && self.payment_module.eq_ignore_ascii_case(module)
    }
}
