use crate::cli::ServeArgs;
use crate::infra::{file_service, memory_service, AppState};
use crate::routes::with_registration_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use quota_form::config::AppConfig;
use quota_form::error::AppError;
use quota_form::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(dir) = args.data_dir.take() {
        config.storage.data_dir = Some(dir);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let routes = match config.storage.data_dir.as_deref() {
        Some(dir) => {
            info!(data_dir = %dir.display(), "registrations stored as json documents");
            with_registration_routes(file_service(dir, &config.storage)?)
        }
        None => {
            warn!("APP_DATA_DIR unset, registrations are kept in memory only");
            with_registration_routes(memory_service(&config.storage))
        }
    };

    let app = routes
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        lock_timeout_ms = config.storage.lock_timeout.as_millis() as u64,
        storage_retries = config.storage.storage_retries,
        "registration service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
