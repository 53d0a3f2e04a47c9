use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::errors;
use crate::app::services::AppServices;

use super::blocking;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Run the orphan label sweep now instead of waiting for the background job.
pub async fn sweep_labels(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match blocking(move || services.sweeper.sweep()).await {
        Ok(Ok(report)) => Json(report).into_response(),
        Ok(Err(e)) => errors::repository_error_to_response(&e),
        Err(response) => response,
    }
}
