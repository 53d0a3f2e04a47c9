use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgeship_core::{CompanyId, InfoPackageId, OrderId, ShipmentId, ShopId};
use forgeship_infra::rules::{PackageEvaluation, PackagesByAddress};
use forgeship_shipments::Shipment;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct BulkGenerationRequest {
    pub info_package_ids: Vec<InfoPackageId>,
}

#[derive(Debug, Deserialize)]
pub struct EligibleCarriersRequest {
    /// Cart packages keyed by delivery address id.
    pub packages: PackagesByAddress,
    /// Also return per-package matched rules and fallback flags.
    #[serde(default)]
    pub explain: bool,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct EligibleCarriersResponse {
    pub packages: PackagesByAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluations: Option<Vec<PackageEvaluation>>,
}

#[derive(Debug, Serialize)]
pub struct ShipmentView {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub order_reference: String,
    pub info_package_id: InfoPackageId,
    pub shipment_number: String,
    pub product: String,
    pub company_id: Option<CompanyId>,
    pub shop_ids: BTreeSet<ShopId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub labels_url: String,
}

impl From<&Shipment> for ShipmentView {
    fn from(s: &Shipment) -> Self {
        Self {
            id: s.id,
            order_id: s.order_id,
            order_reference: s.order_reference.clone(),
            info_package_id: s.info_package_id,
            shipment_number: s.shipment_number.clone(),
            product: s.product.clone(),
            company_id: s.company_id,
            shop_ids: s.shop_ids.clone(),
            created_at: s.created_at,
            updated_at: s.updated_at,
            labels_url: format!("/shipments/{}/labels", s.id),
        }
    }
}
