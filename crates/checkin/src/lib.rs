//! Gateway checkin - 网关状态上报与存活检测
//!
//! 本 crate 提供以下功能：
//! 1. 接收网关 checkin，校验身份与注册状态后按网络分表存储最近一次状态
//! 2. 按 (network, logical id) 查询、列举和删除状态记录
//! 3. 周期性根据最近一次 checkin 的时间判定网关存活并输出指标
//! 4. 多存储后端支持：内存, SQLite

pub mod audit;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod kv;
pub mod metrics;
pub mod reporter;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used items
pub use audit::{AuditLogger, AuditRecord, AuditSink, TracingAuditSink};
pub use config::{
    AuditConfig, CheckinServiceConfig, DirectoryConfig, IdentityConfig, IdentityMode,
    ReporterConfig,
};
pub use directory::{DirectoryError, GatewayDirectory, GatewayRecord, StaticDirectory};
pub use error::{CheckinError, CheckinResult};
pub use handlers::{CheckinState, create_checkin_state, create_router, register_checkin_metrics};
pub use identity::{
    CallContext, ContextIdentityResolver, DirectoryIdentityResolver, GatewayIdentity,
    IdentityResolver,
};
pub use kv::{KvStore, StorageBackend, StorageConfig};
pub use metrics::{MetricsSink, PrometheusGatewayMetrics};
pub use reporter::{ReportSummary, StatusReporter, is_gateway_up};
pub use service::CheckinService;
pub use store::{CheckinStore, status_table};
pub use types::{
    CheckinAction, CheckinRequest, CheckinResponse, GatewayStatus, GatewayStatusRequest,
    ListGatewaysResponse,
};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_checkin_state_creation_with_sqlite() {
        let temp_dir = tempdir().unwrap();

        let config = CheckinServiceConfig {
            storage: StorageConfig {
                backend: StorageBackend::Sqlite,
                sqlite_path: temp_dir.path().to_string_lossy().to_string(),
            },
            ..Default::default()
        };

        let state = create_checkin_state(&config).await.unwrap();
        assert_eq!(state.store().backend_name(), "SQLite");
    }
}
