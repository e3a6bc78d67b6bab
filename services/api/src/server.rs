use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryEventPublisher, InMemoryProductCatalog, InMemoryRentalRepository,
};
use crate::routes::with_rental_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rental_engine::config::AppConfig;
use rental_engine::error::AppError;
use rental_engine::rentals::{PricingPolicy, RentalService};
use rental_engine::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let pricing = PricingPolicy::from(&config.pricing);
    let rental_service = Arc::new(RentalService::new(
        Arc::new(InMemoryProductCatalog::seeded()),
        Arc::new(InMemoryRentalRepository::default()),
        Arc::new(InMemoryEventPublisher::default()),
        pricing,
    ));

    let app = with_rental_routes(rental_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        service_fee_bps = pricing.service_fee_bps(),
        "rental engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
