use axum::{
    Router,
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::app::errors;

pub mod carriers;
pub mod shipments;
pub mod system;

/// Router for all scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/info-packages/:id/shipment", post(shipments::generate_shipment))
        .route("/shipments/bulk", post(shipments::generate_bulk))
        .route("/shipments/:id", delete(shipments::delete_shipment))
        .route("/shipments/:id/labels", get(shipments::print_labels))
        .route("/carriers/eligible", post(carriers::eligible))
        .route("/maintenance/label-sweep", post(system::sweep_labels))
}

/// Run synchronous engine work off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, axum::response::Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "blocking task failed");
        errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "request processing failed",
        )
    })
}
