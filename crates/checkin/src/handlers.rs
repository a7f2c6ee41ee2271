//! Checkin HTTP 处理器

use crate::{
    audit::{AuditLogger, AuditSink, TracingAuditSink},
    config::{CheckinServiceConfig, IdentityMode},
    directory::{GatewayDirectory, StaticDirectory},
    error::{CheckinError, CheckinResult},
    identity::{CallContext, ContextIdentityResolver, DirectoryIdentityResolver, IdentityResolver},
    kv::KvStore,
    service::CheckinService,
    store::CheckinStore,
    types::{CheckinRequest, CheckinResponse, GatewayStatus, GatewayStatusRequest, ListGatewaysResponse},
};
use axum::{
    Router,
    extract::{Json, Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
};
use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

lazy_static! {
    static ref CHECKIN_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("request_duration_seconds", "HTTP request duration in seconds")
            .namespace("checkind")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["method", "path", "status"]
    ).unwrap();

    static ref CHECKIN_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("requests_total", "Total number of HTTP requests")
            .namespace("checkind"),
        &["method", "path", "status"]
    ).unwrap();

    static ref CHECKINS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("checkins_total", "Total number of gateway checkins by outcome")
            .namespace("checkind"),
        &["result"]
    ).unwrap();
}

/// 注册 checkin 请求指标到给定 registry
pub fn register_checkin_metrics(registry: &prometheus::Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(CHECKIN_REQUEST_DURATION.clone()))?;
    registry.register(Box::new(CHECKIN_REQUESTS_TOTAL.clone()))?;
    registry.register(Box::new(CHECKINS_TOTAL.clone()))?;
    Ok(())
}

fn observe<T>(method: &str, path: &str, start: Instant, result: &CheckinResult<T>) {
    let status = match result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status_code(),
    };
    let status = status.as_str();
    CHECKIN_REQUEST_DURATION
        .with_label_values(&[method, path, status])
        .observe(start.elapsed().as_secs_f64());
    CHECKIN_REQUESTS_TOTAL
        .with_label_values(&[method, path, status])
        .inc();
}

/// Checkin 服务状态
#[derive(Clone)]
pub struct CheckinState {
    pub service: CheckinService,
}

impl CheckinState {
    pub fn new(service: CheckinService) -> Self {
        Self { service }
    }

    pub fn store(&self) -> &CheckinStore {
        self.service.store()
    }
}

/// 从配置创建 CheckinState
///
/// 依次构建：KV 存储、网关目录、审计日志、状态存储、身份解析器。
/// 审计 worker 会被 spawn，需要在 tokio runtime 中调用。
pub async fn create_checkin_state(config: &CheckinServiceConfig) -> CheckinResult<CheckinState> {
    info!("Initializing checkin state");

    let kv = KvStore::from_config(&config.storage).await?;
    info!("Status storage backend: {}", kv.backend_name());

    let static_directory = StaticDirectory::from_records(&config.directory.gateways).await;
    for network_id in &config.directory.networks {
        static_directory.add_network(network_id).await;
    }
    info!(
        "Gateway directory seeded with {} gateway(s)",
        config.directory.gateways.len()
    );
    let directory: Arc<dyn GatewayDirectory> = Arc::new(static_directory);

    let audit = if config.audit.enable {
        let sink: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
        AuditLogger::new(sink, config.audit.queue_capacity)
    } else {
        info!("Audit logging disabled");
        AuditLogger::disabled()
    };

    let resolver: Arc<dyn IdentityResolver> = match config.identity.mode {
        IdentityMode::Context => Arc::new(ContextIdentityResolver),
        IdentityMode::Directory => {
            info!("Identity mode 'directory': gateway ids in payloads are trusted");
            Arc::new(DirectoryIdentityResolver::new(directory.clone()))
        }
    };

    let store = CheckinStore::new(kv, directory, audit);
    Ok(CheckinState::new(CheckinService::new(store, resolver)))
}

/// 创建 Checkin 服务的路由
pub fn create_router(state: CheckinState) -> Router {
    Router::new()
        .route("/checkin", post(checkin_handler))
        .route(
            "/networks/{network_id}/gateways/{logical_id}/status",
            get(get_status_handler).delete(delete_status_handler),
        )
        .route("/networks/{network_id}/gateways", get(list_handler))
        .route("/networks/{network_id}", delete(delete_network_handler))
        .route("/health", get(health_check_handler))
        .with_state(state)
}

async fn checkin_handler(
    State(state): State<CheckinState>,
    headers: HeaderMap,
    body: Result<Json<CheckinRequest>, JsonRejection>,
) -> CheckinResult<Json<CheckinResponse>> {
    let start = Instant::now();

    // 身份先于载荷检查：匿名调用方即使载荷非法也只得到 403
    let result = match (CallContext::from_headers(&headers), body) {
        (Err(e), _) => Err(e),
        (Ok(ctx), Ok(Json(request))) => state.service.checkin(&ctx, request).await,
        (Ok(ctx), Err(_)) if ctx.identity.is_none() => {
            Err(CheckinError::PermissionDenied("missing identity".to_string()))
        }
        (Ok(_), Err(rejection)) => Err(CheckinError::Validation(format!(
            "invalid checkin payload: {}",
            rejection.body_text()
        ))),
    };

    let outcome = match &result {
        Ok(_) => "accepted",
        Err(CheckinError::PermissionDenied(_)) => "denied",
        Err(_) => "error",
    };
    CHECKINS_TOTAL.with_label_values(&[outcome]).inc();
    observe("POST", "/checkin", start, &result);

    result.map(Json)
}

async fn get_status_handler(
    State(state): State<CheckinState>,
    Path((network_id, logical_id)): Path<(String, String)>,
) -> CheckinResult<Json<GatewayStatus>> {
    let start = Instant::now();
    debug!("Get status for {}/{}", network_id, logical_id);

    let result = state
        .service
        .get_status(&GatewayStatusRequest::new(network_id, logical_id))
        .await;
    observe("GET", "/networks/status", start, &result);

    result.map(Json)
}

async fn delete_status_handler(
    State(state): State<CheckinState>,
    Path((network_id, logical_id)): Path<(String, String)>,
) -> CheckinResult<StatusCode> {
    let start = Instant::now();
    info!("Delete status for {}/{}", network_id, logical_id);

    let result = state
        .service
        .delete_gateway_status(&GatewayStatusRequest::new(network_id, logical_id))
        .await;
    observe("DELETE", "/networks/status", start, &result);

    result.map(|_| StatusCode::NO_CONTENT)
}

async fn delete_network_handler(
    State(state): State<CheckinState>,
    Path(network_id): Path<String>,
) -> CheckinResult<StatusCode> {
    let start = Instant::now();
    info!("Delete status table of network {}", network_id);

    let result = state.service.delete_network(&network_id).await;
    observe("DELETE", "/networks", start, &result);

    result.map(|_| StatusCode::NO_CONTENT)
}

async fn list_handler(
    State(state): State<CheckinState>,
    Path(network_id): Path<String>,
) -> CheckinResult<Json<ListGatewaysResponse>> {
    let start = Instant::now();

    let result = state.service.list(&network_id).await;
    observe("GET", "/networks/gateways", start, &result);

    result.map(|gateway_ids| Json(ListGatewaysResponse { gateway_ids }))
}

async fn health_check_handler(State(state): State<CheckinState>) -> Json<serde_json::Value> {
    debug!("Health check requested");

    Json(serde_json::json!({
        "status": "healthy",
        "service": "checkin",
        "backend": state.store().backend_name(),
        "timestamp": chrono::Utc::now().timestamp(),
    }))
}
