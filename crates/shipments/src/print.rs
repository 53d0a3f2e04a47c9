use forgeship_core::{LabelId, ShipmentId};

/// Merged label document of one shipment, ready to stream inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintedLabels {
    pub shipment_id: ShipmentId,
    /// Labels in the merged document, in page order.
    pub label_ids: Vec<LabelId>,
    pub bytes: Vec<u8>,
}

impl PrintedLabels {
    pub const CONTENT_TYPE: &'static str = "application/pdf";

    pub fn filename(&self) -> String {
        format!("shipment-{}.pdf", self.shipment_id)
    }

    pub fn content_disposition(&self) -> String {
        format!("inline; filename=\"{}\"", self.filename())
    }

    /// Response headers: PDF, inline, never cached.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("content-type", Self::CONTENT_TYPE.to_string()),
            ("content-disposition", self.content_disposition()),
            (
                "cache-control",
                "no-store, no-cache, must-revalidate, max-age=0".to_string(),
            ),
            ("pragma", "no-cache".to_string()),
            ("expires", "0".to_string()),
        ]
    }
}
