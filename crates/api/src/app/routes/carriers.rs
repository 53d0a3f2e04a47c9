use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use forgeship_core::{RepositoryError, RequestContext};

use crate::app::dto::{EligibleCarriersRequest, EligibleCarriersResponse};
use crate::app::errors;
use crate::app::services::AppServices;

use super::blocking;

/// Filter and reorder the carriers offered for each cart package.
pub async fn eligible(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<EligibleCarriersRequest>,
) -> axum::response::Response {
    let result = blocking(move || -> Result<_, RepositoryError> {
        let applier = services.rule_applier();
        let evaluations = if body.explain {
            Some(applier.evaluate(&body.packages, &ctx)?)
        } else {
            None
        };
        let packages = applier.apply(body.packages, &ctx)?;
        Ok(EligibleCarriersResponse {
            packages,
            evaluations,
        })
    })
    .await;

    match result {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(e)) => errors::repository_error_to_response(&e),
        Err(response) => response,
    }
}
