use crate::cli::ServeArgs;
use crate::infra::{load_store, AppState};
use crate::routes::with_admission_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use event_admission::admission::AdmissionController;
use event_admission::config::AppConfig;
use event_admission::error::AppError;
use event_admission::telemetry;
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

    let store = Arc::new(load_store(config.admission.seed_path.as_deref())?);
    let controller = Arc::new(AdmissionController::in_process(
        store,
        config.admission.settings(),
    ));

    let app = with_admission_routes(controller)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        auto_backfill = config.admission.auto_backfill,
        "event admission service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
