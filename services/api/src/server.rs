use crate::cli::ServeArgs;
use crate::infra::{AppState, LicenseServices};
use crate::routes::with_license_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use license_ease::config::AppConfig;
use license_ease::error::AppError;
use license_ease::telemetry;
use std::sync::atomic::Ordering;
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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let services = LicenseServices::in_memory(&config)?;
    info!(
        categories = services.applications.catalog().categories().len(),
        max_upload_bytes = services.applications.intake().max_bytes(),
        settlement_currency = %config.payments.settlement_currency,
        "license services wired"
    );

    let app = with_license_routes(&services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "license backend ready");

    axum::serve(listener, app).await?;
    Ok(())
}
