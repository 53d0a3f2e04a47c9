use std::collections::BTreeMap;

use serde::Serialize;

use forgeship_core::InfoPackageId;

/// Outcome of a bulk generation: every requested id lands in exactly one side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkGenerationReport {
    /// Generated ids, in request order.
    pub generated: Vec<InfoPackageId>,
    pub errors: BTreeMap<InfoPackageId, String>,
}

impl BulkGenerationReport {
    pub fn record_success(&mut self, id: InfoPackageId) {
        self.generated.push(id);
    }

    pub fn record_failure(&mut self, id: InfoPackageId, message: impl Into<String>) {
        self.errors.insert(id, message.into());
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
