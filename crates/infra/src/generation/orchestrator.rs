//! Shipment generation: from an InfoPackage to a stored shipment.
//!
//! ```text
//! InfoPackage + Order
//!   ↓
//! 1. Scope check (package pending in the request's shop)
//!   ↓
//! 2. Idempotency guard (no live shipment for the package)
//!   ↓
//! 3. Carrier resolution (reference → mapping → type → company → adapter)
//!   ↓
//! 4. Adapter call with a self-contained AdapterContext
//!   ↓
//! 5. Persistence (one commit, blobs after)
//! ```
//!
//! Steps 2 to 5 run under a per-InfoPackage lock. The repository's
//! one-live-shipment-per-order constraint still rejects a lost race.

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use forgeship_core::{CompanyId, InfoPackageId, RequestContext};
use forgeship_shipments::{
    AdapterContext, BulkGenerationReport, CarrierAdapter, CarrierRegistry, Company,
    GenerationError, InfoPackage, OrderSnapshot, Shipment, ShipmentPayload, ShopShippingOptions,
    TypeShipment,
};

use crate::label_storage::LabelStorage;
use crate::repository::Repositories;

use super::lock::KeyedLocks;
use super::persistence::{PersistShipment, ShipmentPersister};

/// Response key carrying the final shipment number.
const SHIPMENT_NUMBER_KEY: &str = "shipment_number";
/// Response key an adapter may use to attribute the shipment to another company.
const COMPANY_ID_KEY: &str = "company_id";

pub struct ShipmentGenerator {
    repositories: Repositories,
    registry: CarrierRegistry,
    persister: ShipmentPersister,
    locks: KeyedLocks<InfoPackageId>,
}

impl ShipmentGenerator {
    pub fn new(
        repositories: Repositories,
        registry: CarrierRegistry,
        storage: Arc<dyn LabelStorage>,
    ) -> Self {
        let persister = ShipmentPersister::new(
            Arc::clone(&repositories.shipments),
            Arc::clone(&repositories.catalog),
            storage,
        );
        Self {
            repositories,
            registry,
            persister,
            locks: KeyedLocks::new(),
        }
    }

    pub fn registry(&self) -> &CarrierRegistry {
        &self.registry
    }

    /// Generate the shipment of one InfoPackage.
    #[instrument(skip(self, ctx), fields(shop_id = ?ctx.shop_id()), err)]
    pub fn generate_for_package(
        &self,
        ctx: &RequestContext,
        info_package_id: InfoPackageId,
    ) -> Result<Shipment, GenerationError> {
        let repos = &self.repositories;

        let package = repos
            .info_packages
            .find(info_package_id)?
            .ok_or(GenerationError::InfoPackageNotFound(info_package_id))?;
        let order = repos
            .orders
            .find(package.order_id)?
            .ok_or(GenerationError::OrderNotFound(package.order_id))?;

        if let Some(shop_id) = ctx.shop_id() {
            if !repos
                .info_packages
                .pending_ids_for_shop(shop_id)?
                .contains(&info_package_id)
            {
                return Err(GenerationError::InfoPackageNotFound(info_package_id));
            }
        }

        let _guard = self.locks.acquire(info_package_id);

        if repos
            .shipments
            .find_live_by_info_package(info_package_id)?
            .is_some()
        {
            return Err(GenerationError::ShipmentAlreadyExists(info_package_id));
        }

        let resolved = self.resolve_carrier(&package, &order)?;
        let options = repos.shops.options(package.shop_id)?;
        let cash_on_delivery = cash_on_delivery(&package, &order, &options);

        let adapter_ctx = AdapterContext {
            carrier_code: resolved.company.code.clone(),
            order_id: order.id,
            order_reference: order.reference.clone(),
            shipment_number: Uuid::now_v7().to_string(),
            payload: ShipmentPayload {
                info_package: package.clone(),
                customer: order.customer.clone(),
                delivery_address: order.delivery_address.clone(),
                sender: repos.shops.sender(package.shop_id)?,
                company: resolved.company.clone(),
                type_shipment: resolved.type_shipment.clone(),
                type_shipments: resolved.type_shipments,
                companies: repos.catalog.companies()?,
                cash_on_delivery,
            },
            options,
        };

        let result = resolved
            .adapter
            .generate_shipment(&adapter_ctx)
            .map_err(|source| GenerationError::Adapter {
                code: resolved.company.code.clone(),
                source,
            })?;

        let shipment_number = Some(result.shipment_number.trim())
            .filter(|n| !n.is_empty())
            .unwrap_or(adapter_ctx.shipment_number.as_str())
            .to_string();
        let response_payload = normalize_response(result.response_payload, &shipment_number);
        let company_id = company_from_response(&response_payload).or(Some(resolved.company.id));

        self.persister.create_or_update(PersistShipment {
            order,
            info_package_id,
            shop_id: package.shop_id,
            shipment_number,
            product: resolved.type_shipment.name,
            company_id,
            request_payload: result.request_payload,
            response_payload,
            labels: result.labels,
        })
    }

    /// Generate each id independently; failures are collected, never raised.
    pub fn generate_bulk(
        &self,
        ctx: &RequestContext,
        info_package_ids: &[InfoPackageId],
    ) -> BulkGenerationReport {
        let mut report = BulkGenerationReport::default();
        for &id in info_package_ids {
            match self.generate_for_package(ctx, id) {
                Ok(_) => report.record_success(id),
                Err(err) => {
                    warn!(info_package_id = %id, error = %err, "bulk generation failed for package");
                    report.record_failure(id, err.to_string());
                }
            }
        }
        info!(
            generated = report.generated.len(),
            failed = report.errors.len(),
            "bulk shipment generation finished"
        );
        report
    }

    fn resolve_carrier(
        &self,
        package: &InfoPackage,
        order: &OrderSnapshot,
    ) -> Result<ResolvedCarrier, GenerationError> {
        let catalog = &self.repositories.catalog;

        let reference = package.effective_reference(order).ok_or_else(|| {
            GenerationError::CarrierNotConfigured(format!(
                "info package {} has no carrier reference",
                package.id
            ))
        })?;

        let mapping = catalog.mapping_for(reference)?.ok_or_else(|| {
            GenerationError::CarrierNotConfigured(format!(
                "carrier reference {reference} is not mapped to a shipment type"
            ))
        })?;

        let type_shipment_id = package
            .type_shipment_id
            .filter(|id| id.get() != 0)
            .unwrap_or(mapping.type_shipment_id);
        let type_shipment = catalog.type_shipment(type_shipment_id)?.ok_or_else(|| {
            GenerationError::CarrierNotConfigured(format!(
                "shipment type {type_shipment_id} not found"
            ))
        })?;

        let company = catalog
            .company(type_shipment.company_id)?
            .filter(|c| c.active)
            .ok_or_else(|| {
                GenerationError::CarrierNotConfigured(format!(
                    "company {} of shipment type {} is missing or inactive",
                    type_shipment.company_id, type_shipment.id
                ))
            })?;

        let type_shipments = catalog.type_shipments_of(company.id)?;
        if type_shipments.is_empty() {
            return Err(GenerationError::TypeShipmentsMissing(company.id));
        }

        let adapter = self
            .registry
            .get(&company.code)
            .ok_or_else(|| GenerationError::AdapterNotRegistered(company.code.clone()))?;

        Ok(ResolvedCarrier {
            company,
            type_shipment,
            type_shipments,
            adapter,
        })
    }
}

struct ResolvedCarrier {
    company: Company,
    type_shipment: TypeShipment,
    type_shipments: Vec<TypeShipment>,
    adapter: Arc<dyn CarrierAdapter>,
}

/// Amount to collect: only for orders paid with the cash-on-delivery module;
/// the package's own amount wins over the order total.
fn cash_on_delivery(
    package: &InfoPackage,
    order: &OrderSnapshot,
    options: &ShopShippingOptions,
) -> Option<f64> {
    let module = options.cod_module.as_deref()?;
    if !order.paid_with(module) {
        return None;
    }
    package
        .cash_on_delivery
        .filter(|amount| *amount > 0.0)
        .or(Some(order.total_paid))
}

/// Response as a JSON object with the final shipment number injected.
fn normalize_response(response: Option<JsonValue>, shipment_number: &str) -> JsonValue {
    let mut object = match response {
        Some(JsonValue::Object(map)) => map,
        None | Some(JsonValue::Null) => Map::new(),
        Some(other) => {
            let mut map = Map::new();
            map.insert("response".to_string(), other);
            map
        }
    };
    object.insert(
        SHIPMENT_NUMBER_KEY.to_string(),
        JsonValue::String(shipment_number.to_string()),
    );
    JsonValue::Object(object)
}

fn company_from_response(response: &JsonValue) -> Option<CompanyId> {
    let raw = match response.get(COMPANY_ID_KEY)? {
        JsonValue::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    raw.filter(|id| *id != 0).map(CompanyId::new)
}
