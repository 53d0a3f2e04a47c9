//! Service wiring: which repositories and storage back the engine.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::{error, info, warn};

use forgeship_infra::repository::{
    AddressResolver, InMemoryAddressResolver, InMemoryCarrierCatalog, InMemoryInfoPackages,
    InMemoryOrders, InMemoryRuleRepository, InMemoryShipmentStore, InMemoryShops,
    PostgresShipmentStore, RuleRepository, ShipmentRepository,
};
use forgeship_infra::{
    FsLabelStorage, LabelPrinter, LabelStorage, OrphanLabelSweeper, Repositories, RuleApplier,
    RuleProvider, ShipmentGenerator, ShippingConfig,
};
use forgeship_shipments::{CarrierRegistry, ShopShippingOptions};

/// Engine services shared by every handler.
pub struct AppServices {
    pub generator: ShipmentGenerator,
    pub printer: LabelPrinter,
    pub sweeper: Arc<OrphanLabelSweeper>,
    pub shipments: Arc<dyn ShipmentRepository>,
    rules: Arc<dyn RuleRepository>,
    addresses: Arc<dyn AddressResolver>,
}

impl AppServices {
    pub fn new(
        repositories: Repositories,
        rules: Arc<dyn RuleRepository>,
        addresses: Arc<dyn AddressResolver>,
        registry: CarrierRegistry,
        storage: Arc<dyn LabelStorage>,
    ) -> Self {
        let shipments = Arc::clone(&repositories.shipments);
        Self {
            printer: LabelPrinter::new(Arc::clone(&shipments), Arc::clone(&storage)),
            sweeper: Arc::new(OrphanLabelSweeper::new(
                Arc::clone(&shipments),
                Arc::clone(&storage),
            )),
            generator: ShipmentGenerator::new(repositories, registry, storage),
            shipments,
            rules,
            addresses,
        }
    }

    /// Rule applier with a fresh cache: rules are loaded once per request.
    pub fn rule_applier(
        &self,
    ) -> RuleApplier<Arc<dyn RuleRepository>, Arc<dyn AddressResolver>> {
        RuleApplier::new(
            RuleProvider::new(Arc::clone(&self.rules)),
            Arc::clone(&self.addresses),
        )
    }
}

/// In-memory reference data and shipment store.
///
/// The host platform owns packages, orders and the carrier catalog; this
/// backend stands in for it in tests and single-process deployments.
#[derive(Clone)]
pub struct InMemoryStores {
    pub info_packages: Arc<InMemoryInfoPackages>,
    pub orders: Arc<InMemoryOrders>,
    pub catalog: Arc<InMemoryCarrierCatalog>,
    pub shops: Arc<InMemoryShops>,
    pub shipments: Arc<InMemoryShipmentStore>,
    pub rules: Arc<InMemoryRuleRepository>,
    pub addresses: Arc<InMemoryAddressResolver>,
}

impl InMemoryStores {
    pub fn new(default_options: ShopShippingOptions) -> Self {
        Self {
            info_packages: Arc::new(InMemoryInfoPackages::new()),
            orders: Arc::new(InMemoryOrders::new()),
            catalog: Arc::new(InMemoryCarrierCatalog::new()),
            shops: Arc::new(InMemoryShops::new(default_options)),
            shipments: Arc::new(InMemoryShipmentStore::new()),
            rules: Arc::new(InMemoryRuleRepository::new()),
            addresses: Arc::new(InMemoryAddressResolver::new()),
        }
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            info_packages: self.info_packages.clone(),
            orders: self.orders.clone(),
            catalog: self.catalog.clone(),
            shops: self.shops.clone(),
            shipments: self.shipments.clone(),
        }
    }

    pub fn into_services(
        self,
        registry: CarrierRegistry,
        storage: Arc<dyn LabelStorage>,
    ) -> AppServices {
        AppServices::new(
            self.repositories(),
            self.rules.clone(),
            self.addresses.clone(),
            registry,
            storage,
        )
    }
}

/// Wire services from configuration: filesystem label storage, Postgres
/// shipments when `DATABASE_URL` is set, in-memory otherwise.
pub async fn build_services(
    config: &ShippingConfig,
    registry: CarrierRegistry,
) -> anyhow::Result<AppServices> {
    if registry.is_empty() {
        warn!("no carrier adapters registered; shipment generation will fail");
    }

    let storage: Arc<dyn LabelStorage> = Arc::new(FsLabelStorage::new(config.label_dir.clone())?);
    let stores = InMemoryStores::new(config.default_options());
    let mut repositories = stores.repositories();

    if let Some(database_url) = &config.database_url {
        let pool = PgPool::connect(database_url).await?;
        let store = PostgresShipmentStore::new(pool);
        store.ensure_schema().await?;
        repositories.shipments = Arc::new(store);
        info!("shipments persisted in postgres");
    }

    let services = AppServices::new(
        repositories,
        stores.rules.clone(),
        stores.addresses.clone(),
        registry,
        storage,
    );

    match config.sweep_interval() {
        Some(every) => {
            spawn_label_sweeper(Arc::clone(&services.sweeper), every);
        }
        None => warn!("orphan label sweep disabled; deleted shipments keep their labels"),
    }

    Ok(services)
}

/// Background job: sweep labels of soft-deleted shipments every `every`.
pub fn spawn_label_sweeper(
    sweeper: Arc<OrphanLabelSweeper>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "orphan label sweep scheduled");
    tokio::task::spawn_blocking(move || loop {
        std::thread::sleep(every);
        if let Err(e) = sweeper.sweep() {
            error!(error = %e, "orphan label sweep failed");
        }
    })
}
