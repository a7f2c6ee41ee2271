//! HTTP 服务与后台任务的组装

use crate::trace::http_trace_layer;
use axum::{
    Router,
    http::header,
    response::IntoResponse,
    routing::get,
};
use checkin::{
    CheckinState, MetricsSink, PrometheusGatewayMetrics, ReporterConfig, StatusReporter,
    create_router,
};
use checkind_common::metrics::{REGISTRY, export_metrics};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Checkin API + `/metrics`，外加 HTTP span
pub fn build_app(state: CheckinState) -> Router {
    create_router(state)
        .route("/metrics", get(metrics_handler))
        .layer(http_trace_layer())
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        export_metrics(),
    )
}

/// 在已绑定的 listener 上启动 HTTP 服务
///
/// 收到关闭广播后优雅退出；服务自身出错时广播关闭，让其它任务一起停下。
pub fn spawn_http_server(
    listener: TcpListener,
    app: Router,
    shutdown_tx: broadcast::Sender<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("HTTP server received shutdown signal");
        });
        if let Err(e) = server.await {
            error!("HTTP server error: {}", e);
            let _ = shutdown_tx.send(());
        }
        info!("HTTP server stopped");
    })
}

/// 启动周期性状态上报，指标注册到全局 Registry
///
/// `reporter.enable = false` 时返回 `None`。
pub fn spawn_reporter(
    state: &CheckinState,
    config: &ReporterConfig,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<Option<JoinHandle<()>>, prometheus::Error> {
    if !config.enable {
        info!("Status reporter disabled");
        return Ok(None);
    }

    let metrics: Arc<dyn MetricsSink> = Arc::new(PrometheusGatewayMetrics::new(&REGISTRY)?);
    let reporter = StatusReporter::new(state.store().clone(), metrics, config);
    info!(
        "Status reporter started: interval={}s, staleness_threshold={}s",
        config.interval_secs, config.staleness_threshold_secs
    );

    Ok(Some(tokio::spawn(reporter.run(shutdown_tx.subscribe()))))
}
