use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgeship_core::{CompanyId, Entity, InfoPackageId, OrderId, ShipmentId, ShopId};

use crate::label::NewLabel;

/// A generated shipment.
///
/// Invariant: at most one live (non-deleted) shipment per order id. Repositories
/// enforce it at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub order_reference: String,
    pub shipment_number: String,
    /// Product label shown in the back office (shipment type name).
    pub product: String,
    /// `None` when the company was deleted after generation.
    pub company_id: Option<CompanyId>,
    pub info_package_id: InfoPackageId,
    /// JSON text of what the adapter sent to the carrier.
    pub request_payload: Option<String>,
    /// JSON text of the carrier response (with the final shipment number).
    pub response_payload: Option<String>,
    pub shop_ids: BTreeSet<ShopId>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Carrier-agnostic fields written by one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub order_id: OrderId,
    pub order_reference: String,
    pub shipment_number: String,
    pub product: String,
    pub company_id: Option<CompanyId>,
    pub info_package_id: InfoPackageId,
    pub request_payload: Option<String>,
    pub response_payload: Option<String>,
    pub shop_id: ShopId,
}

/// Everything one generation persists, committed as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentWrite {
    /// Existing live shipment updated in place; `None` inserts a new one.
    pub target: Option<ShipmentId>,
    pub record: ShipmentRecord,
    pub labels: Vec<NewLabel>,
}

impl Shipment {
    pub fn from_record(id: ShipmentId, record: ShipmentRecord, now: DateTime<Utc>) -> Self {
        let mut shipment = Self {
            id,
            order_id: record.order_id,
            order_reference: String::new(),
            shipment_number: String::new(),
            product: String::new(),
            company_id: None,
            info_package_id: record.info_package_id,
            request_payload: None,
            response_payload: None,
            shop_ids: BTreeSet::new(),
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        shipment.apply_record(record, now);
        shipment
    }

    /// Overwrite the carrier-agnostic fields; shop association is additive.
    pub fn apply_record(&mut self, record: ShipmentRecord, now: DateTime<Utc>) {
        self.order_id = record.order_id;
        self.order_reference = record.order_reference;
        self.shipment_number = record.shipment_number;
        self.product = record.product;
        self.company_id = record.company_id;
        self.info_package_id = record.info_package_id;
        self.request_payload = record.request_payload;
        self.response_payload = record.response_payload;
        self.associate_shop(record.shop_id);
        self.updated_at = now;
    }

    /// Idempotent; returns whether the association is new.
    pub fn associate_shop(&mut self, shop_id: ShopId) -> bool {
        self.shop_ids.insert(shop_id)
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

impl Entity for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
