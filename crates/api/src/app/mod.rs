//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: repositories, label storage and engine services
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    // Scoped routes: request context resolved from headers.
    let scoped = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(
            middleware::request_context_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(scoped)
        .layer(ServiceBuilder::new())
}
