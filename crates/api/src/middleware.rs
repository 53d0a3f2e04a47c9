use axum::{
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::app::errors::json_error;
use crate::context::context_from_headers;

/// Resolve the request scope from headers and insert it as a
/// [`forgeship_core::RequestContext`] extension.
pub async fn request_context_middleware(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let ctx = context_from_headers(req.headers())
        .map_err(|msg| json_error(StatusCode::BAD_REQUEST, "invalid_header", msg))?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
