//! Shipment labels and storage-key resolution.
//!
//! A label's PDF lives in content-addressed blob storage under its storage key.
//! Older rows may only carry an embedded payload whose meaning was never
//! recorded: it is either a storage key or the base64 PDF itself. New rows carry
//! an explicit [`PayloadKind`]; legacy rows fall back to [`looks_like_base64`].

use std::collections::BTreeSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use forgeship_core::{Entity, LabelId, ShipmentId, ShopId};

/// Minimum length for the base64 heuristic; shorter strings are treated as keys.
pub const BASE64_MIN_LEN: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    StorageKey,
    Base64Pdf,
}

/// One printable unit (one physical parcel) of a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub shipment_id: ShipmentId,
    /// Carrier-assigned parcel id.
    pub package_id: String,
    pub tracker_code: Option<String>,
    pub label_type: Option<String>,
    pub storage_key: Option<String>,
    pub payload: Option<String>,
    /// Absent on legacy rows.
    pub payload_kind: Option<PayloadKind>,
    pub printed: bool,
    pub shop_ids: BTreeSet<ShopId>,
}

/// Label row to create (or refresh) during persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLabel {
    pub package_id: String,
    pub tracker_code: Option<String>,
    pub label_type: Option<String>,
    pub storage_key: String,
    pub payload: Option<String>,
    pub payload_kind: Option<PayloadKind>,
    pub shop_id: ShopId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    StorageKey,
    Payload,
    PackageId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub key: String,
    pub source: KeySource,
}

impl Label {
    pub fn from_new(id: LabelId, shipment_id: ShipmentId, new: &NewLabel) -> Self {
        let mut label = Self {
            id,
            shipment_id,
            package_id: new.package_id.clone(),
            tracker_code: None,
            label_type: None,
            storage_key: None,
            payload: None,
            payload_kind: None,
            printed: false,
            shop_ids: BTreeSet::new(),
        };
        label.refresh_from(new);
        label
    }

    /// Regeneration for the same parcel: take the new carrier data, reset the
    /// printed flag.
    pub fn refresh_from(&mut self, new: &NewLabel) {
        self.tracker_code = new.tracker_code.clone();
        self.label_type = new.label_type.clone();
        self.storage_key = Some(new.storage_key.clone());
        self.payload = new.payload.clone();
        self.payload_kind = new.payload_kind;
        self.printed = false;
        self.shop_ids.insert(new.shop_id);
    }

    pub fn mark_printed(&mut self) {
        self.printed = true;
    }

    /// Explicit kind when recorded, heuristic otherwise.
    pub fn payload_is_base64(&self) -> bool {
        match (self.payload.as_deref(), self.payload_kind) {
            (None, _) => false,
            (Some(_), Some(kind)) => kind == PayloadKind::Base64Pdf,
            (Some(payload), None) => looks_like_base64(payload),
        }
    }

    /// Base64 PDF usable to rebuild a missing blob.
    pub fn healing_payload(&self) -> Option<&str> {
        if self.payload_is_base64() {
            self.payload.as_deref()
        } else {
            None
        }
    }

    /// Storage key precedence: stored key, then an embedded payload that is a
    /// key (not base64), then the carrier package id.
    pub fn resolve_storage_key(&self) -> Option<ResolvedKey> {
        if let Some(key) = non_empty(self.storage_key.as_deref()) {
            return Some(ResolvedKey {
                key: key.to_string(),
                source: KeySource::StorageKey,
            });
        }
        if let Some(payload) = non_empty(self.payload.as_deref()) {
            if !self.payload_is_base64() {
                return Some(ResolvedKey {
                    key: payload.to_string(),
                    source: KeySource::Payload,
                });
            }
        }
        non_empty(Some(self.package_id.as_str())).map(|key| ResolvedKey {
            key: key.to_string(),
            source: KeySource::PackageId,
        })
    }
}

impl Entity for Label {
    type Id = LabelId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Heuristic used for rows without an explicit payload kind: at least
/// [`BASE64_MIN_LEN`] characters of the base64 alphabet (line breaks allowed)
/// with at most two trailing `=`.
pub fn looks_like_base64(value: &str) -> bool {
    if value.len() < BASE64_MIN_LEN {
        return false;
    }
    let body = value.trim_end_matches('=');
    if body.is_empty() || value.len() - body.len() > 2 {
        return false;
    }
    body.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'\r' | b'\n'))
}

/// Decode a base64 PDF payload, ignoring line breaks and surrounding blanks.
pub fn decode_base64_pdf(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(cleaned)
}
