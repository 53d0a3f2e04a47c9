use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
};

use forgeship_core::{InfoPackageId, RequestContext, ShipmentId};

use crate::app::dto::{BulkGenerationRequest, ShipmentView};
use crate::app::errors;
use crate::app::services::AppServices;

use super::blocking;

pub async fn generate_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<InfoPackageId>,
) -> axum::response::Response {
    let result = blocking(move || services.generator.generate_for_package(&ctx, id)).await;

    match result {
        Ok(Ok(shipment)) => {
            (StatusCode::CREATED, Json(ShipmentView::from(&shipment))).into_response()
        }
        Ok(Err(e)) => errors::generation_error_to_response(&e),
        Err(response) => response,
    }
}

/// Always 200: per-package failures are part of the report.
pub async fn generate_bulk(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<BulkGenerationRequest>,
) -> axum::response::Response {
    let result = blocking(move || {
        services
            .generator
            .generate_bulk(&ctx, &body.info_package_ids)
    })
    .await;

    match result {
        Ok(report) => Json(report).into_response(),
        Err(response) => response,
    }
}

/// Merged label PDF, inline and never cached.
pub async fn print_labels(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<ShipmentId>,
) -> axum::response::Response {
    let printed = match blocking(move || services.printer.print_labels(id)).await {
        Ok(Ok(printed)) => printed,
        Ok(Err(e)) => return errors::label_error_to_response(&e),
        Err(response) => return response,
    };

    let headers = printed.headers();
    let mut response = printed.bytes.into_response();
    for (name, value) in headers {
        let Ok(value) = HeaderValue::from_str(&value) else {
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "labels_unavailable",
                "labels unavailable, contact support",
            );
        };
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
    response
}

/// Soft delete. Label files stay until the orphan sweep.
pub async fn delete_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<ShipmentId>,
) -> axum::response::Response {
    match blocking(move || services.shipments.mark_deleted(id)).await {
        Ok(Ok(true)) => StatusCode::NO_CONTENT.into_response(),
        Ok(Ok(false)) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("shipment {id} not found"),
        ),
        Ok(Err(e)) => errors::repository_error_to_response(&e),
        Err(response) => response,
    }
}
