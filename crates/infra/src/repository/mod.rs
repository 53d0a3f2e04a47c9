//! Repository boundaries consumed by the engine.
//!
//! Repositories are synchronous and transactional from the engine's point of
//! view. Everything except shipments and labels is read-only here; those two are
//! written through [`ShipmentRepository::commit`] as a single unit.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use forgeship_core::{
    AddressId, CarrierId, CompanyId, CountryId, InfoPackageId, LabelId, OrderId,
    RepositoryError, ShipmentId, ShopGroupId, ShopId, TypeShipmentId, ZoneId,
};
use forgeship_rules::ValidationRule;
use forgeship_shipments::{
    CarrierMapping, Company, InfoPackage, Label, OrderSnapshot, Shipment, ShipmentWrite,
    ShopSender, ShopShippingOptions, TypeShipment,
};

pub use in_memory::{
    InMemoryAddressResolver, InMemoryCarrierCatalog, InMemoryInfoPackages, InMemoryOrders,
    InMemoryRuleRepository, InMemoryShipmentStore, InMemoryShops,
};
pub use postgres::PostgresShipmentStore;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

pub trait RuleRepository: Send + Sync {
    /// Active rules visible from the scope, in storage order.
    fn find_active_rules_for_context(
        &self,
        shop_id: Option<ShopId>,
        shop_group_id: Option<ShopGroupId>,
    ) -> RepositoryResult<Vec<ValidationRule>>;
}

impl<T: RuleRepository + ?Sized> RuleRepository for Arc<T> {
    fn find_active_rules_for_context(
        &self,
        shop_id: Option<ShopId>,
        shop_group_id: Option<ShopGroupId>,
    ) -> RepositoryResult<Vec<ValidationRule>> {
        (**self).find_active_rules_for_context(shop_id, shop_group_id)
    }
}

pub trait InfoPackageRepository: Send + Sync {
    fn find(&self, id: InfoPackageId) -> RepositoryResult<Option<InfoPackage>>;

    /// Packages queued for shipping in the given shop.
    fn pending_ids_for_shop(&self, shop_id: ShopId) -> RepositoryResult<Vec<InfoPackageId>>;
}

pub trait OrderRepository: Send + Sync {
    fn find(&self, id: OrderId) -> RepositoryResult<Option<OrderSnapshot>>;
}

pub trait CarrierCatalog: Send + Sync {
    fn mapping_for(&self, reference_id: CarrierId) -> RepositoryResult<Option<CarrierMapping>>;

    fn type_shipment(&self, id: TypeShipmentId) -> RepositoryResult<Option<TypeShipment>>;

    fn company(&self, id: CompanyId) -> RepositoryResult<Option<Company>>;

    fn companies(&self) -> RepositoryResult<Vec<Company>>;

    /// Active shipment types of one company.
    fn type_shipments_of(&self, company_id: CompanyId) -> RepositoryResult<Vec<TypeShipment>>;
}

pub trait ShopRepository: Send + Sync {
    fn sender(&self, shop_id: ShopId) -> RepositoryResult<Option<ShopSender>>;

    fn options(&self, shop_id: ShopId) -> RepositoryResult<ShopShippingOptions>;
}

pub trait ShipmentRepository: Send + Sync {
    fn find(&self, id: ShipmentId) -> RepositoryResult<Option<Shipment>>;

    fn find_live_by_order(&self, order_id: OrderId) -> RepositoryResult<Option<Shipment>>;

    fn find_live_by_info_package(
        &self,
        info_package_id: InfoPackageId,
    ) -> RepositoryResult<Option<Shipment>>;

    /// Create (no target) or update the shipment and upsert its labels in one
    /// transaction. Labels are matched by carrier package id within the
    /// shipment. A second live shipment for the same order fails with
    /// [`RepositoryError::UniqueViolation`].
    ///
    /// Returns the stored shipment and the labels written, in write order.
    fn commit(&self, write: ShipmentWrite) -> RepositoryResult<(Shipment, Vec<Label>)>;

    /// Labels of a shipment in creation order.
    fn labels_for(&self, shipment_id: ShipmentId) -> RepositoryResult<Vec<Label>>;

    fn save_labels(&self, labels: &[Label]) -> RepositoryResult<()>;

    /// Flag a live shipment deleted. `false` when there was nothing to flag.
    fn mark_deleted(&self, id: ShipmentId) -> RepositoryResult<bool>;

    /// Bring a soft-deleted shipment back, subject to the live-order constraint.
    fn restore(&self, id: ShipmentId) -> RepositoryResult<bool>;

    fn labels_of_deleted_shipments(&self) -> RepositoryResult<Vec<Label>>;

    /// Whether a label of a live shipment resolves to `key`.
    fn is_key_referenced_by_live_label(&self, key: &str) -> RepositoryResult<bool>;

    fn delete_label(&self, id: LabelId) -> RepositoryResult<()>;
}

/// Zone and country of a delivery address; both absent when unresolvable.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub zone_id: Option<ZoneId>,
    pub country_id: Option<CountryId>,
}

pub trait AddressResolver: Send + Sync {
    fn resolve(&self, address_id: AddressId) -> RepositoryResult<ResolvedAddress>;
}

impl<T: AddressResolver + ?Sized> AddressResolver for Arc<T> {
    fn resolve(&self, address_id: AddressId) -> RepositoryResult<ResolvedAddress> {
        (**self).resolve(address_id)
    }
}

/// Repositories the generation pipeline reads and writes.
#[derive(Clone)]
pub struct Repositories {
    pub info_packages: Arc<dyn InfoPackageRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub catalog: Arc<dyn CarrierCatalog>,
    pub shops: Arc<dyn ShopRepository>,
    pub shipments: Arc<dyn ShipmentRepository>,
}
