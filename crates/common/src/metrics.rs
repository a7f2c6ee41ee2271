//! Prometheus 监控指标模块
//!
//! 全局 Registry 及其导出。checkin 请求指标和网关存活指标由各自模块定义，
//! 在这里统一注册。

use lazy_static::lazy_static;
use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Once;
use tracing::warn;

static METRICS_INIT: Once = Once::new();

lazy_static! {
    /// 全局 Prometheus Registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// 构建信息，值恒为 1
    pub static ref BUILD_INFO: IntGaugeVec = IntGaugeVec::new(
        Opts::new("build_info", "Build information of the running checkind")
            .namespace("checkind"),
        &["version", "instance"]
    ).unwrap();

    /// 服务注册表中的条目数
    pub static ref REGISTERED_SERVICES: IntGauge = IntGauge::with_opts(
        Opts::new("registered_services", "Number of services in the service registry")
            .namespace("checkind")
    ).unwrap();
}

/// 注册所有进程级指标到全局 Registry
///
/// 幂等：只有第一次调用会真正注册。
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let mut result = Ok(());

    METRICS_INIT.call_once(|| {
        let register_result = (|| {
            REGISTRY.register(Box::new(BUILD_INFO.clone()))?;
            REGISTRY.register(Box::new(REGISTERED_SERVICES.clone()))?;
            checkin::register_checkin_metrics(&REGISTRY)?;
            Ok::<(), prometheus::Error>(())
        })();

        if let Err(e) = register_result {
            result = Err(e);
        }
    });

    result
}

/// 记录构建信息
pub fn set_build_info(instance: &str) {
    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION"), instance])
        .set(1);
}

/// 导出 Prometheus 文本格式的指标
pub fn export_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_export_metrics() {
        let _ = register_metrics();
        set_build_info("test-instance");
        REGISTERED_SERVICES.set(3);

        let output = export_metrics();
        assert!(output.contains("checkind_build_info"));
        assert!(output.contains(r#"instance="test-instance""#));
        assert!(output.contains("checkind_registered_services 3"));
    }
}
