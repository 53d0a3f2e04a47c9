//! Label printing: resolve every label blob of a shipment, rebuild missing
//! ones from their embedded payload, merge them into one PDF.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use forgeship_core::ShipmentId;
use forgeship_shipments::{Label, LabelPrintError, PrintedLabels, decode_base64_pdf};

use crate::label_storage::LabelStorage;
use crate::pdf::merge_pdfs;
use crate::repository::ShipmentRepository;

pub struct LabelPrinter {
    shipments: Arc<dyn ShipmentRepository>,
    storage: Arc<dyn LabelStorage>,
}

impl LabelPrinter {
    pub fn new(shipments: Arc<dyn ShipmentRepository>, storage: Arc<dyn LabelStorage>) -> Self {
        Self { shipments, storage }
    }

    /// Merge the labels of a live shipment in stored order.
    ///
    /// Labels are flagged printed only once every blob was found and the
    /// merge succeeded. Healed storage keys are saved even when the merge
    /// then fails.
    #[instrument(skip(self), err)]
    pub fn print_labels(&self, shipment_id: ShipmentId) -> Result<PrintedLabels, LabelPrintError> {
        let shipment = self
            .shipments
            .find(shipment_id)?
            .filter(|s| s.is_live())
            .ok_or(LabelPrintError::ShipmentNotFound(shipment_id))?;

        let mut labels = self.shipments.labels_for(shipment.id)?;
        if labels.is_empty() {
            return Err(LabelPrintError::LabelsMissing(shipment.id));
        }

        let mut documents = Vec::with_capacity(labels.len());
        let mut healed = Vec::new();
        for label in &mut labels {
            let (bytes, was_healed) = self.load_blob(label)?;
            if was_healed {
                healed.push(label.clone());
            }
            documents.push(bytes);
        }
        if !healed.is_empty() {
            self.shipments.save_labels(&healed)?;
        }

        let bytes = merge_pdfs(&documents).map_err(|e| LabelPrintError::Merge {
            shipment_id: shipment.id,
            reason: e.to_string(),
        })?;

        for label in &mut labels {
            label.mark_printed();
        }
        self.shipments.save_labels(&labels)?;

        info!(
            shipment_id = %shipment.id,
            labels = labels.len(),
            healed = healed.len(),
            size = bytes.len(),
            "shipment labels printed"
        );
        Ok(PrintedLabels {
            shipment_id: shipment.id,
            label_ids: labels.iter().map(|l| l.id).collect(),
            bytes,
        })
    }

    /// Blob bytes of one label and whether the label row was corrected.
    fn load_blob(&self, label: &mut Label) -> Result<(Vec<u8>, bool), LabelPrintError> {
        let resolved = label.resolve_storage_key();

        if let Some(resolved) = &resolved {
            if let Some(bytes) = self.storage.read(&resolved.key).map_err(storage_error)? {
                return Ok((bytes, false));
            }
        }

        let corrupt = |key: Option<&str>| LabelPrintError::LabelCorrupt {
            shipment_id: label.shipment_id,
            key: key.unwrap_or("<none>").to_string(),
        };
        let key_hint = resolved.as_ref().map(|r| r.key.as_str());

        let Some(payload) = label.healing_payload() else {
            return Err(corrupt(key_hint));
        };
        let bytes = decode_base64_pdf(payload).map_err(|e| {
            warn!(label_id = %label.id, error = %e, "label payload is not valid base64");
            corrupt(key_hint)
        })?;

        let key = resolved
            .map(|r| r.key)
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        self.storage.write(&key, &bytes).map_err(storage_error)?;

        warn!(
            shipment_id = %label.shipment_id,
            label_id = %label.id,
            key = %key,
            "label blob rebuilt from embedded payload"
        );
        label.storage_key = Some(key);
        Ok((bytes, true))
    }
}

fn storage_error(err: crate::label_storage::StorageError) -> LabelPrintError {
    LabelPrintError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use forgeship_core::{InfoPackageId, LabelId, OrderId, ShopId};
    use forgeship_shipments::{NewLabel, PayloadKind, ShipmentRecord, ShipmentWrite};

    use crate::label_storage::InMemoryLabelStorage;
    use crate::pdf::tests::one_page_pdf;
    use crate::repository::InMemoryShipmentStore;

    fn setup(labels: Vec<NewLabel>) -> (Arc<InMemoryShipmentStore>, Arc<InMemoryLabelStorage>, ShipmentId) {
        let store = Arc::new(InMemoryShipmentStore::new());
        let (shipment, _) = store
            .commit(ShipmentWrite {
                target: None,
                record: ShipmentRecord {
                    order_id: OrderId::new(1),
                    order_reference: "REF".to_string(),
                    shipment_number: "N1".to_string(),
                    product: "Express".to_string(),
                    company_id: None,
                    info_package_id: InfoPackageId::new(1),
                    request_payload: None,
                    response_payload: None,
                    shop_id: ShopId::new(1),
                },
                labels,
            })
            .unwrap();
        (store, Arc::new(InMemoryLabelStorage::new()), shipment.id)
    }

    fn new_label(package: &str, key: &str, payload: Option<String>) -> NewLabel {
        NewLabel {
            package_id: package.to_string(),
            tracker_code: None,
            label_type: None,
            storage_key: key.to_string(),
            payload_kind: payload.as_ref().map(|_| PayloadKind::Base64Pdf),
            payload,
            shop_id: ShopId::new(1),
        }
    }

    #[test]
    fn unknown_shipment_is_not_found() {
        let (store, storage, _) = setup(vec![]);
        let printer = LabelPrinter::new(store, storage);
        assert!(matches!(
            printer.print_labels(ShipmentId::new(99)),
            Err(LabelPrintError::ShipmentNotFound(_))
        ));
    }

    #[test]
    fn shipment_without_labels_is_reported() {
        let (store, storage, id) = setup(vec![]);
        let printer = LabelPrinter::new(store, storage);
        assert!(matches!(
            printer.print_labels(id),
            Err(LabelPrintError::LabelsMissing(_))
        ));
    }

    #[test]
    fn stored_blobs_are_merged_and_flagged_printed() {
        let (store, storage, id) = setup(vec![new_label("P1", "k1", None), new_label("P2", "k2", None)]);
        storage.write("k1", &one_page_pdf("one")).unwrap();
        storage.write("k2", &one_page_pdf("two")).unwrap();
        let printer = LabelPrinter::new(store.clone(), storage);

        let printed = printer.print_labels(id).unwrap();

        assert_eq!(crate::pdf::page_count(&printed.bytes).unwrap(), 2);
        assert_eq!(printed.label_ids.len(), 2);
        assert!(store.labels_for(id).unwrap().iter().all(|l| l.printed));
    }

    #[test]
    fn missing_blob_without_payload_is_corrupt_and_nothing_printed() {
        let (store, storage, id) = setup(vec![new_label("P1", "k1", None), new_label("P2", "k2", None)]);
        storage.write("k1", &one_page_pdf("one")).unwrap();
        let printer = LabelPrinter::new(store.clone(), storage);

        let err = printer.print_labels(id).unwrap_err();

        assert!(matches!(err, LabelPrintError::LabelCorrupt { ref key, .. } if key == "k2"));
        assert!(store.labels_for(id).unwrap().iter().all(|l| !l.printed));
    }

    #[test]
    fn legacy_label_without_key_is_healed_under_a_fresh_key() {
        let (store, storage, id) = setup(vec![new_label("P1", "k1", None)]);
        let payload = STANDARD.encode(one_page_pdf("legacy"));
        let legacy = Label {
            id: LabelId::new(500),
            shipment_id: id,
            package_id: " ".to_string(),
            tracker_code: None,
            label_type: None,
            storage_key: None,
            payload: Some(payload),
            payload_kind: None,
            printed: false,
            shop_ids: BTreeSet::new(),
        };
        let mut existing = store.labels_for(id).unwrap();
        existing[0] = Label { id: existing[0].id, ..legacy };
        store.save_labels(&existing).unwrap();
        let printer = LabelPrinter::new(store.clone(), storage.clone());

        printer.print_labels(id).unwrap();

        let label = &store.labels_for(id).unwrap()[0];
        let key = label.storage_key.clone().unwrap();
        assert!(Uuid::parse_str(&key).is_ok());
        assert!(storage.exists(&key).unwrap());
        assert!(label.printed);
    }
}
