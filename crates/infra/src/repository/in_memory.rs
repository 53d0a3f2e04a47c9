//! In-memory repositories.
//!
//! Intended for tests/dev. Every store guards its state with one `RwLock`; a
//! poisoned lock surfaces as [`RepositoryError::Backend`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use forgeship_core::{
    AddressId, CarrierId, CompanyId, InfoPackageId, LabelId, OrderId, RepositoryError,
    ShipmentId, ShopGroupId, ShopId, TypeShipmentId,
};
use forgeship_rules::ValidationRule;
use forgeship_shipments::{
    CarrierMapping, Company, InfoPackage, Label, OrderSnapshot, Shipment, ShipmentWrite,
    ShopSender, ShopShippingOptions, TypeShipment,
};

use super::{
    AddressResolver, CarrierCatalog, InfoPackageRepository, OrderRepository, RepositoryResult,
    ResolvedAddress, RuleRepository, ShipmentRepository, ShopRepository,
};

fn read<T>(lock: &RwLock<T>) -> RepositoryResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| RepositoryError::backend("lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> RepositoryResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| RepositoryError::backend("lock poisoned"))
}

// Rules

#[derive(Debug, Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<Vec<ValidationRule>>,
    queries: AtomicUsize,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, rule: ValidationRule) -> RepositoryResult<()> {
        write(&self.rules)?.push(rule);
        Ok(())
    }

    /// Number of lookups served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl RuleRepository for InMemoryRuleRepository {
    fn find_active_rules_for_context(
        &self,
        shop_id: Option<ShopId>,
        shop_group_id: Option<ShopGroupId>,
    ) -> RepositoryResult<Vec<ValidationRule>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let rules = read(&self.rules)?;
        Ok(rules
            .iter()
            .filter(|rule| rule.active && rule.applies_to(shop_id, shop_group_id))
            .cloned()
            .collect())
    }
}

// Info packages

#[derive(Debug, Default)]
pub struct InMemoryInfoPackages {
    packages: RwLock<BTreeMap<InfoPackageId, InfoPackage>>,
}

impl InMemoryInfoPackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, package: InfoPackage) -> RepositoryResult<()> {
        write(&self.packages)?.insert(package.id, package);
        Ok(())
    }
}

impl InfoPackageRepository for InMemoryInfoPackages {
    fn find(&self, id: InfoPackageId) -> RepositoryResult<Option<InfoPackage>> {
        Ok(read(&self.packages)?.get(&id).cloned())
    }

    fn pending_ids_for_shop(&self, shop_id: ShopId) -> RepositoryResult<Vec<InfoPackageId>> {
        Ok(read(&self.packages)?
            .values()
            .filter(|package| package.shop_id == shop_id)
            .map(|package| package.id)
            .collect())
    }
}

// Orders

#[derive(Debug, Default)]
pub struct InMemoryOrders {
    orders: RwLock<HashMap<OrderId, OrderSnapshot>>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: OrderSnapshot) -> RepositoryResult<()> {
        write(&self.orders)?.insert(order.id, order);
        Ok(())
    }
}

impl OrderRepository for InMemoryOrders {
    fn find(&self, id: OrderId) -> RepositoryResult<Option<OrderSnapshot>> {
        Ok(read(&self.orders)?.get(&id).cloned())
    }
}

// Carrier catalog

#[derive(Debug, Default)]
struct CatalogState {
    companies: BTreeMap<CompanyId, Company>,
    type_shipments: BTreeMap<TypeShipmentId, TypeShipment>,
    mappings: HashMap<CarrierId, CarrierMapping>,
}

#[derive(Debug, Default)]
pub struct InMemoryCarrierCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCarrierCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_company(&self, company: Company) -> RepositoryResult<()> {
        write(&self.state)?.companies.insert(company.id, company);
        Ok(())
    }

    pub fn add_type_shipment(&self, type_shipment: TypeShipment) -> RepositoryResult<()> {
        write(&self.state)?
            .type_shipments
            .insert(type_shipment.id, type_shipment);
        Ok(())
    }

    pub fn add_mapping(&self, mapping: CarrierMapping) -> RepositoryResult<()> {
        write(&self.state)?
            .mappings
            .insert(mapping.reference_id, mapping);
        Ok(())
    }
}

impl CarrierCatalog for InMemoryCarrierCatalog {
    fn mapping_for(&self, reference_id: CarrierId) -> RepositoryResult<Option<CarrierMapping>> {
        Ok(read(&self.state)?.mappings.get(&reference_id).copied())
    }

    fn type_shipment(&self, id: TypeShipmentId) -> RepositoryResult<Option<TypeShipment>> {
        Ok(read(&self.state)?.type_shipments.get(&id).cloned())
    }

    fn company(&self, id: CompanyId) -> RepositoryResult<Option<Company>> {
        Ok(read(&self.state)?.companies.get(&id).cloned())
    }

    fn companies(&self) -> RepositoryResult<Vec<Company>> {
        Ok(read(&self.state)?.companies.values().cloned().collect())
    }

    fn type_shipments_of(&self, company_id: CompanyId) -> RepositoryResult<Vec<TypeShipment>> {
        Ok(read(&self.state)?
            .type_shipments
            .values()
            .filter(|ts| ts.company_id == company_id && ts.active)
            .cloned()
            .collect())
    }
}

// Shops

#[derive(Debug, Default)]
pub struct InMemoryShops {
    senders: RwLock<HashMap<ShopId, ShopSender>>,
    options: RwLock<HashMap<ShopId, ShopShippingOptions>>,
    defaults: ShopShippingOptions,
}

impl InMemoryShops {
    /// `defaults` answers for shops without their own options.
    pub fn new(defaults: ShopShippingOptions) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn set_sender(&self, shop_id: ShopId, sender: ShopSender) -> RepositoryResult<()> {
        write(&self.senders)?.insert(shop_id, sender);
        Ok(())
    }

    pub fn set_options(&self, shop_id: ShopId, options: ShopShippingOptions) -> RepositoryResult<()> {
        write(&self.options)?.insert(shop_id, options);
        Ok(())
    }
}

impl ShopRepository for InMemoryShops {
    fn sender(&self, shop_id: ShopId) -> RepositoryResult<Option<ShopSender>> {
        Ok(read(&self.senders)?.get(&shop_id).cloned())
    }

    fn options(&self, shop_id: ShopId) -> RepositoryResult<ShopShippingOptions> {
        Ok(read(&self.options)?
            .get(&shop_id)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone()))
    }
}

// Addresses

#[derive(Debug, Default)]
pub struct InMemoryAddressResolver {
    addresses: RwLock<HashMap<AddressId, ResolvedAddress>>,
}

impl InMemoryAddressResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, address_id: AddressId, resolved: ResolvedAddress) -> RepositoryResult<()> {
        write(&self.addresses)?.insert(address_id, resolved);
        Ok(())
    }
}

impl AddressResolver for InMemoryAddressResolver {
    fn resolve(&self, address_id: AddressId) -> RepositoryResult<ResolvedAddress> {
        Ok(read(&self.addresses)?
            .get(&address_id)
            .copied()
            .unwrap_or_default())
    }
}

// Shipments + labels

#[derive(Debug, Default)]
struct ShipmentState {
    shipments: BTreeMap<ShipmentId, Shipment>,
    labels: BTreeMap<LabelId, Label>,
    last_shipment_id: u32,
    last_label_id: u32,
}

impl ShipmentState {
    fn live_for_order(&self, order_id: OrderId, except: Option<ShipmentId>) -> bool {
        self.shipments
            .values()
            .any(|s| s.is_live() && s.order_id == order_id && Some(s.id) != except)
    }
}

/// Shipment store enforcing "one live shipment per order" at commit time.
#[derive(Debug, Default)]
pub struct InMemoryShipmentStore {
    state: RwLock<ShipmentState>,
}

impl InMemoryShipmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every shipment row, deleted ones included.
    pub fn all_shipments(&self) -> RepositoryResult<Vec<Shipment>> {
        Ok(read(&self.state)?.shipments.values().cloned().collect())
    }

    pub fn all_labels(&self) -> RepositoryResult<Vec<Label>> {
        Ok(read(&self.state)?.labels.values().cloned().collect())
    }
}

impl ShipmentRepository for InMemoryShipmentStore {
    fn find(&self, id: ShipmentId) -> RepositoryResult<Option<Shipment>> {
        Ok(read(&self.state)?.shipments.get(&id).cloned())
    }

    fn find_live_by_order(&self, order_id: OrderId) -> RepositoryResult<Option<Shipment>> {
        Ok(read(&self.state)?
            .shipments
            .values()
            .find(|s| s.is_live() && s.order_id == order_id)
            .cloned())
    }

    fn find_live_by_info_package(
        &self,
        info_package_id: InfoPackageId,
    ) -> RepositoryResult<Option<Shipment>> {
        Ok(read(&self.state)?
            .shipments
            .values()
            .find(|s| s.is_live() && s.info_package_id == info_package_id)
            .cloned())
    }

    fn commit(&self, write_op: ShipmentWrite) -> RepositoryResult<(Shipment, Vec<Label>)> {
        let mut guard = write(&self.state)?;
        let state = &mut *guard;
        let now = Utc::now();
        let ShipmentWrite {
            target,
            record,
            labels,
        } = write_op;

        let shipment_id = match target {
            Some(id) => {
                let shipment = state
                    .shipments
                    .get_mut(&id)
                    .filter(|s| s.is_live())
                    .ok_or_else(|| RepositoryError::missing(format!("live shipment {id}")))?;
                shipment.apply_record(record, now);
                id
            }
            None => {
                if state.live_for_order(record.order_id, None) {
                    return Err(RepositoryError::UniqueViolation(format!(
                        "a live shipment already exists for order {}",
                        record.order_id
                    )));
                }
                state.last_shipment_id += 1;
                let id = ShipmentId::new(state.last_shipment_id);
                state
                    .shipments
                    .insert(id, Shipment::from_record(id, record, now));
                id
            }
        };

        let mut written = Vec::with_capacity(labels.len());
        for new in &labels {
            let existing = state
                .labels
                .values_mut()
                .find(|l| l.shipment_id == shipment_id && l.package_id == new.package_id);
            let label = match existing {
                Some(label) => {
                    label.refresh_from(new);
                    label.clone()
                }
                None => {
                    state.last_label_id += 1;
                    let label =
                        Label::from_new(LabelId::new(state.last_label_id), shipment_id, new);
                    state.labels.insert(label.id, label.clone());
                    label
                }
            };
            written.push(label);
        }

        let shipment = state
            .shipments
            .get(&shipment_id)
            .cloned()
            .ok_or_else(|| RepositoryError::missing(format!("shipment {shipment_id}")))?;
        Ok((shipment, written))
    }

    fn labels_for(&self, shipment_id: ShipmentId) -> RepositoryResult<Vec<Label>> {
        Ok(read(&self.state)?
            .labels
            .values()
            .filter(|l| l.shipment_id == shipment_id)
            .cloned()
            .collect())
    }

    fn save_labels(&self, labels: &[Label]) -> RepositoryResult<()> {
        let mut state = write(&self.state)?;
        if let Some(unknown) = labels.iter().find(|l| !state.labels.contains_key(&l.id)) {
            return Err(RepositoryError::missing(format!("label {}", unknown.id)));
        }
        for label in labels {
            state.labels.insert(label.id, label.clone());
        }
        Ok(())
    }

    fn mark_deleted(&self, id: ShipmentId) -> RepositoryResult<bool> {
        let mut state = write(&self.state)?;
        match state.shipments.get_mut(&id).filter(|s| s.is_live()) {
            Some(shipment) => {
                shipment.deleted = true;
                shipment.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn restore(&self, id: ShipmentId) -> RepositoryResult<bool> {
        let mut guard = write(&self.state)?;
        let state = &mut *guard;
        let Some(order_id) = state
            .shipments
            .get(&id)
            .filter(|s| s.deleted)
            .map(|s| s.order_id)
        else {
            return Ok(false);
        };
        if state.live_for_order(order_id, Some(id)) {
            return Err(RepositoryError::UniqueViolation(format!(
                "a live shipment already exists for order {order_id}"
            )));
        }
        if let Some(shipment) = state.shipments.get_mut(&id) {
            shipment.deleted = false;
            shipment.updated_at = Utc::now();
        }
        Ok(true)
    }

    fn labels_of_deleted_shipments(&self) -> RepositoryResult<Vec<Label>> {
        let state = read(&self.state)?;
        Ok(state
            .labels
            .values()
            .filter(|l| state.shipments.get(&l.shipment_id).is_some_and(|s| s.deleted))
            .cloned()
            .collect())
    }

    fn is_key_referenced_by_live_label(&self, key: &str) -> RepositoryResult<bool> {
        let state = read(&self.state)?;
        Ok(state.labels.values().any(|l| {
            state.shipments.get(&l.shipment_id).is_some_and(Shipment::is_live)
                && l.resolve_storage_key().is_some_and(|resolved| resolved.key == key)
        }))
    }

    fn delete_label(&self, id: LabelId) -> RepositoryResult<()> {
        write(&self.state)?
            .labels
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::missing(format!("label {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeship_shipments::{NewLabel, ShipmentRecord};

    fn record(order: u32, package: u32) -> ShipmentRecord {
        ShipmentRecord {
            order_id: OrderId::new(order),
            order_reference: format!("REF{order}"),
            shipment_number: "N-1".to_string(),
            product: "24h".to_string(),
            company_id: None,
            info_package_id: InfoPackageId::new(package),
            request_payload: None,
            response_payload: Some("{}".to_string()),
            shop_id: ShopId::new(1),
        }
    }

    fn new_label(package_id: &str, key: &str) -> NewLabel {
        NewLabel {
            package_id: package_id.to_string(),
            tracker_code: None,
            label_type: None,
            storage_key: key.to_string(),
            payload: None,
            payload_kind: None,
            shop_id: ShopId::new(1),
        }
    }

    #[test]
    fn second_live_shipment_for_order_is_rejected() {
        let store = InMemoryShipmentStore::new();
        let first = ShipmentWrite {
            target: None,
            record: record(5, 1),
            labels: vec![],
        };
        store.commit(first.clone()).unwrap();

        let err = store.commit(first).unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(store.all_shipments().unwrap().len(), 1);
    }

    #[test]
    fn deleted_shipment_frees_the_order() {
        let store = InMemoryShipmentStore::new();
        let write_op = ShipmentWrite {
            target: None,
            record: record(5, 1),
            labels: vec![],
        };
        let (first, _) = store.commit(write_op.clone()).unwrap();
        assert!(store.mark_deleted(first.id).unwrap());
        assert!(!store.mark_deleted(first.id).unwrap());

        let (second, _) = store.commit(write_op).unwrap();
        assert_ne!(first.id, second.id);

        let err = store.restore(first.id).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn labels_are_upserted_by_package_id() {
        let store = InMemoryShipmentStore::new();
        let (shipment, labels) = store
            .commit(ShipmentWrite {
                target: None,
                record: record(5, 1),
                labels: vec![new_label("P1", "k1"), new_label("P2", "k2")],
            })
            .unwrap();
        assert_eq!(labels.len(), 2);

        let mut printed = labels[0].clone();
        printed.mark_printed();
        store.save_labels(&[printed]).unwrap();

        let (_, again) = store
            .commit(ShipmentWrite {
                target: Some(shipment.id),
                record: record(5, 1),
                labels: vec![new_label("P1", "k1b")],
            })
            .unwrap();

        let all = store.labels_for(shipment.id).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(again[0].id, labels[0].id);
        assert_eq!(all[0].storage_key.as_deref(), Some("k1b"));
        assert!(!all[0].printed);
    }

    #[test]
    fn update_of_missing_target_fails() {
        let store = InMemoryShipmentStore::new();
        let err = store
            .commit(ShipmentWrite {
                target: Some(ShipmentId::new(42)),
                record: record(5, 1),
                labels: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Missing(_)));
    }

    #[test]
    fn unresolved_address_has_no_zone_or_country() {
        let resolver = InMemoryAddressResolver::new();
        assert_eq!(
            resolver.resolve(AddressId::new(1)).unwrap(),
            ResolvedAddress::default()
        );
    }
}
