//! Removal of labels left behind by soft-deleted shipments.
//!
//! Deleting a shipment only flags it. The sweeper runs outside any request and
//! removes the blob first, then the label row, so a failed blob removal is
//! retried on the next sweep. A blob whose key is still resolved by a label of
//! a live shipment (a regenerated order reusing a carrier package id) stays.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use forgeship_core::{LabelId, RepositoryError};

use crate::label_storage::LabelStorage;
use crate::repository::ShipmentRepository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub label_id: LabelId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub labels_removed: usize,
    pub blobs_removed: usize,
    pub failures: Vec<SweepFailure>,
}

pub struct OrphanLabelSweeper {
    shipments: Arc<dyn ShipmentRepository>,
    storage: Arc<dyn LabelStorage>,
}

impl OrphanLabelSweeper {
    pub fn new(shipments: Arc<dyn ShipmentRepository>, storage: Arc<dyn LabelStorage>) -> Self {
        Self { shipments, storage }
    }

    pub fn sweep(&self) -> Result<SweepReport, RepositoryError> {
        let mut report = SweepReport::default();

        for label in self.shipments.labels_of_deleted_shipments()? {
            if let Some(resolved) = label.resolve_storage_key() {
                if self.shipments.is_key_referenced_by_live_label(&resolved.key)? {
                    debug!(label_id = %label.id, key = %resolved.key, "blob shared with a live label; keeping it");
                } else {
                    match self.storage.remove(&resolved.key) {
                        Ok(true) => report.blobs_removed += 1,
                        Ok(false) => {}
                        Err(err) => {
                            warn!(label_id = %label.id, key = %resolved.key, error = %err, "label blob not removed");
                            report.failures.push(SweepFailure {
                                label_id: label.id,
                                reason: err.to_string(),
                            });
                            continue;
                        }
                    }
                }
            }

            match self.shipments.delete_label(label.id) {
                Ok(()) => report.labels_removed += 1,
                Err(err) => report.failures.push(SweepFailure {
                    label_id: label.id,
                    reason: err.to_string(),
                }),
            }
        }

        info!(
            labels_removed = report.labels_removed,
            blobs_removed = report.blobs_removed,
            failures = report.failures.len(),
            "orphan label sweep finished"
        );
        Ok(report)
    }
}
