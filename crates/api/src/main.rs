use std::sync::Arc;

use forgeship_infra::ShippingConfig;
use forgeship_shipments::CarrierRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    forgeship_observability::init();

    let config = ShippingConfig::from_env();
    let services = forgeship_api::app::services::build_services(&config, CarrierRegistry::new()).await?;
    let app = forgeship_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
