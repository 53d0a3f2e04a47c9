use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use forgeship_core::RepositoryError;
use forgeship_shipments::{ErrorKind, GenerationError, LabelPrintError};

pub fn status_for(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "conflict"),
        ErrorKind::Configuration => (StatusCode::UNPROCESSABLE_ENTITY, "configuration_error"),
        ErrorKind::Adapter => (StatusCode::BAD_GATEWAY, "carrier_error"),
        ErrorKind::Serialization => (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error"),
        ErrorKind::Storage => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        ErrorKind::Repository => (StatusCode::INTERNAL_SERVER_ERROR, "repository_error"),
    }
}

pub fn generation_error_to_response(err: &GenerationError) -> axum::response::Response {
    let (status, code) = status_for(err.kind());
    if status.is_server_error() {
        error!(error = %err, "shipment generation failed");
    }
    json_error(status, code, err.to_string())
}

/// Label failures other than an unknown shipment only expose a generic
/// message; the detail goes to the logs.
pub fn label_error_to_response(err: &LabelPrintError) -> axum::response::Response {
    let (status, code) = match err.kind() {
        ErrorKind::NotFound => status_for(ErrorKind::NotFound),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "labels_unavailable"),
    };
    if status.is_server_error() {
        error!(error = %err, "label printing failed");
    }
    json_error(status, code, err.user_message())
}

pub fn repository_error_to_response(err: &RepositoryError) -> axum::response::Response {
    if err.is_unique_violation() {
        return json_error(StatusCode::CONFLICT, "conflict", err.to_string());
    }
    error!(error = %err, "repository failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "repository_error", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
