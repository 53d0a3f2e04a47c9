use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use forgeship_core::{CarrierId, InfoPackageId, OrderId, ShopId, TypeShipmentId};

use crate::order::OrderSnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// Shipment intent prepared when an order is ready to ship.
///
/// Immutable reference data for generation; one InfoPackage yields at most one
/// live shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoPackage {
    pub id: InfoPackageId,
    pub order_id: OrderId,
    pub shop_id: ShopId,
    pub reference_carrier_id: Option<CarrierId>,
    /// Overrides the shipment type mapped to the reference carrier.
    pub type_shipment_id: Option<TypeShipmentId>,
    pub quantity: u32,
    pub weight: f64,
    pub dimensions: Dimensions,
    pub cash_on_delivery: Option<f64>,
    pub hour_from: Option<NaiveTime>,
    pub hour_until: Option<NaiveTime>,
    pub return_package: bool,
    /// Declared value.
    pub vsec: Option<f64>,
    /// Origin code.
    pub dorig: Option<String>,
    pub observations: Option<String>,
}

impl InfoPackage {
    /// Reference carrier for generation: the package's own, else the carrier
    /// chosen at checkout. Zero ids count as absent.
    pub fn effective_reference(&self, order: &OrderSnapshot) -> Option<CarrierId> {
        self.reference_carrier_id
            .filter(|id| id.get() != 0)
            .or(order.carrier_reference_id.filter(|id| id.get() != 0))
    }

    /// Whether the pickup window is usable (both ends set and ordered).
    pub fn has_delivery_window(&self) -> bool {
        matches!((self.hour_from, self.hour_until), (Some(from), Some(until)) if from <= until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{AddressSnapshot, CustomerSnapshot};

    fn package(reference: Option<u32>) -> InfoPackage {
        InfoPackage {
            id: InfoPackageId::new(1),
            order_id: OrderId::new(10),
            shop_id: ShopId::new(1),
            reference_carrier_id: reference.map(CarrierId::new),
            type_shipment_id: None,
            quantity: 1,
            weight: 1.0,
            dimensions: Dimensions::default(),
            cash_on_delivery: None,
            hour_from: None,
            hour_until: None,
            return_package: false,
            vsec: None,
            dorig: None,
            observations: None,
        }
    }

    fn order(reference: Option<u32>) -> OrderSnapshot {
        OrderSnapshot {
            id: OrderId::new(10),
            reference: "XKBKNABJK".to_string(),
            shop_id: ShopId::new(1),
            carrier_reference_id: reference.map(CarrierId::new),
            payment_module: "ps_wirepayment".to_string(),
            total_paid: 12.5,
            customer: CustomerSnapshot::default(),
            delivery_address: AddressSnapshot::default(),
        }
    }

    #[test]
    fn package_reference_wins_over_order() {
        assert_eq!(
            package(Some(4)).effective_reference(&order(Some(9))),
            Some(CarrierId::new(4))
        );
    }

    #[test]
    fn zero_package_reference_falls_back_to_order() {
        assert_eq!(
            package(Some(0)).effective_reference(&order(Some(9))),
            Some(CarrierId::new(9))
        );
        assert_eq!(package(None).effective_reference(&order(Some(0))), None);
    }

    #[test]
    fn delivery_window_requires_ordered_bounds() {
        let mut p = package(None);
        assert!(!p.has_delivery_window());
        p.hour_from = NaiveTime::from_hms_opt(9, 0, 0);
        p.hour_until = NaiveTime::from_hms_opt(14, 0, 0);
        assert!(p.has_delivery_window());
        p.hour_until = NaiveTime::from_hms_opt(8, 0, 0);
        assert!(!p.has_delivery_window());
    }
}
