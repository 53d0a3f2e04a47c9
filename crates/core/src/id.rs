//! Strongly-typed identifiers used across the shipping domain.
//!
//! Every entity is referenced by a small integer id (the storefront's primary
//! keys). Relations are resolved through repositories, never through embedded
//! object graphs.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

macro_rules! int_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(u32);

        impl $t {
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u32 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u32> for $t {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$t> for u32 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

int_id!(
    /// Storefront shop.
    ShopId, "ShopId"
);
int_id!(
    /// Group of shops sharing configuration.
    ShopGroupId, "ShopGroupId"
);
int_id!(LanguageId, "LanguageId");
int_id!(
    /// Platform carrier reference id (stable across carrier edits).
    CarrierId, "CarrierId"
);
int_id!(ZoneId, "ZoneId");
int_id!(CountryId, "CountryId");
int_id!(ProductId, "ProductId");
int_id!(CategoryId, "CategoryId");
int_id!(AddressId, "AddressId");
int_id!(OrderId, "OrderId");
int_id!(
    /// Pre-generation shipment intent.
    InfoPackageId, "InfoPackageId"
);
int_id!(ShipmentId, "ShipmentId");
int_id!(LabelId, "LabelId");
int_id!(
    /// Carrier company (the business behind one adapter).
    CompanyId, "CompanyId"
);
int_id!(TypeShipmentId, "TypeShipmentId");
int_id!(RuleId, "RuleId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_round_trip() {
        let id: ShipmentId = " 42 ".parse().unwrap();
        assert_eq!(id, ShipmentId::new(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn rejects_non_numeric_ids() {
        let err = "abc".parse::<OrderId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => assert!(msg.starts_with("OrderId")),
            other => panic!("expected InvalidId, got {other:?}"),
        }
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&CarrierId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: CarrierId = serde_json::from_str("7").unwrap();
        assert_eq!(back, CarrierId::new(7));
    }
}
