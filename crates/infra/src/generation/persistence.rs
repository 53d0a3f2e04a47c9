//! Turns an adapter result into a stored shipment and its labels.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use forgeship_core::{CompanyId, InfoPackageId, ShopId};
use forgeship_shipments::{
    GenerationError, LabelDescriptor, NewLabel, OrderSnapshot, PayloadKind, Shipment,
    ShipmentRecord, ShipmentWrite, decode_base64_pdf,
};

use crate::label_storage::LabelStorage;
use crate::repository::{CarrierCatalog, ShipmentRepository};

/// Everything needed to store one generated shipment.
#[derive(Debug, Clone)]
pub struct PersistShipment {
    pub order: OrderSnapshot,
    pub info_package_id: InfoPackageId,
    pub shop_id: ShopId,
    pub shipment_number: String,
    /// Shipment type name shown to operators.
    pub product: String,
    pub company_id: Option<CompanyId>,
    pub request_payload: Option<JsonValue>,
    pub response_payload: JsonValue,
    pub labels: Vec<LabelDescriptor>,
}

pub struct ShipmentPersister {
    shipments: Arc<dyn ShipmentRepository>,
    catalog: Arc<dyn CarrierCatalog>,
    storage: Arc<dyn LabelStorage>,
}

impl ShipmentPersister {
    pub fn new(
        shipments: Arc<dyn ShipmentRepository>,
        catalog: Arc<dyn CarrierCatalog>,
        storage: Arc<dyn LabelStorage>,
    ) -> Self {
        Self {
            shipments,
            catalog,
            storage,
        }
    }

    /// Create the shipment, or update the order's live one in place, together
    /// with its labels in one commit. Label blobs are written afterwards; a
    /// failed blob write is logged and repaired at print time.
    pub fn create_or_update(&self, command: PersistShipment) -> Result<Shipment, GenerationError> {
        let existing = self.shipments.find_live_by_order(command.order.id)?;

        let company_id = match command.company_id {
            Some(id) => {
                let company = self.catalog.company(id)?;
                if company.is_none() {
                    warn!(company_id = %id, order_id = %command.order.id, "shipment company not found, stored without company");
                }
                company.map(|c| c.id)
            }
            None => None,
        };

        let request_payload = command
            .request_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let response_payload = Some(serde_json::to_string(&command.response_payload)?);

        let mut labels = Vec::with_capacity(command.labels.len());
        for (position, descriptor) in command.labels.iter().enumerate() {
            match new_label(descriptor, command.shop_id) {
                Some(label) => labels.push(label),
                None => warn!(
                    order_id = %command.order.id,
                    info_package_id = %command.info_package_id,
                    position,
                    storage_key = ?descriptor.storage_key,
                    package_id = ?descriptor.package_id,
                    "carrier label without storage key or package id dropped"
                ),
            }
        }

        let write = ShipmentWrite {
            target: existing.as_ref().map(|s| s.id),
            record: ShipmentRecord {
                order_id: command.order.id,
                order_reference: command.order.reference.clone(),
                shipment_number: command.shipment_number.clone(),
                product: command.product.clone(),
                company_id,
                info_package_id: command.info_package_id,
                request_payload,
                response_payload,
                shop_id: command.shop_id,
            },
            labels,
        };

        let (shipment, stored_labels) = self.shipments.commit(write).map_err(|e| {
            if e.is_unique_violation() {
                GenerationError::ShipmentAlreadyExists(command.info_package_id)
            } else {
                GenerationError::Repository(e)
            }
        })?;

        for label in &stored_labels {
            let (Some(key), Some(content)) = (label.storage_key.as_deref(), label.healing_payload())
            else {
                continue;
            };
            let result = decode_base64_pdf(content)
                .map_err(|e| e.to_string())
                .and_then(|bytes| self.storage.write(key, &bytes).map_err(|e| e.to_string()));
            if let Err(reason) = result {
                warn!(
                    shipment_id = %shipment.id,
                    label_id = %label.id,
                    key,
                    %reason,
                    "label blob not written, it will be rebuilt when printing"
                );
            }
        }

        info!(
            shipment_id = %shipment.id,
            order_id = %shipment.order_id,
            info_package_id = %shipment.info_package_id,
            shipment_number = %shipment.shipment_number,
            labels = stored_labels.len(),
            updated = existing.is_some(),
            "shipment persisted"
        );
        Ok(shipment)
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn new_label(descriptor: &LabelDescriptor, shop_id: ShopId) -> Option<NewLabel> {
    let storage_key = non_empty(descriptor.storage_key.as_ref())?;
    let package_id = non_empty(descriptor.package_id.as_ref())?;
    let payload = non_empty(descriptor.pdf_content_base64.as_ref()).map(str::to_string);

    Some(NewLabel {
        package_id: package_id.to_string(),
        tracker_code: descriptor.tracker_code.clone(),
        label_type: descriptor.label_type.clone(),
        storage_key: storage_key.to_string(),
        payload_kind: payload.as_ref().map(|_| PayloadKind::Base64Pdf),
        payload,
        shop_id,
    })
}
