use crate::collector::Collector;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const LANDING_PAGE: &str = r#"<html>
<head><title>EMQX Exporter</title></head>
<body>
<h1>EMQX Exporter</h1>
<ul>
<li><a href="/metrics">Metrics</a></li>
<li><a href="/config">Configuration</a></li>
</ul>
</body>
</html>
"#;

pub(crate) struct AppState {
    pub(crate) collector: Collector,
    /// exporter self-metrics only, cluster families are rendered per scrape
    pub(crate) handle: PrometheusHandle,
    /// rendered once at startup, secrets already masked
    pub(crate) config_yaml: String,
}

// Endpoints
// - GET /        landing page linking the two below
// - GET /metrics runs every collector, renders this scrape then the exporter's own metrics
// - GET /config  effective configuration as YAML, api_secret masked
pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/metrics", get(metrics))
        .route("/config", get(config))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves the router until `shutdown` is cancelled, then drains in-flight requests.
pub(crate) async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("http server stopped");
    Ok(())
}

async fn landing() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let mut body = state.collector.collect().await;
    let exporter = state.handle.render();
    if !body.is_empty() && !exporter.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }
    body.push_str(&exporter);
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response()
}

async fn config(State(state): State<Arc<AppState>>) -> Response {
    if state.config_yaml.is_empty() {
        error!("configuration is not available");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.config_yaml.clone(),
    )
        .into_response()
}
