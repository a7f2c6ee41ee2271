//! 网关存活指标
//!
//! 状态上报器通过 `MetricsSink` 输出指标，生产环境使用 Prometheus 实现。

use prometheus::{GaugeVec, IntGaugeVec, Opts, Registry};

/// 状态上报器的指标输出
pub trait MetricsSink: Send + Sync {
    /// 网关是否存活（1 / 0）
    fn set_gateway_up(&self, network_id: &str, gateway_id: &str, up: bool);

    /// 网关当前配置的年龄（秒）
    fn set_config_age(&self, network_id: &str, gateway_id: &str, age_secs: f64);

    /// 网络内存活网关数和网关总数
    fn set_network_counts(&self, network_id: &str, up: usize, total: usize);
}

/// Prometheus 实现，所有指标注册到调用方给定的 registry
#[derive(Clone)]
pub struct PrometheusGatewayMetrics {
    checkin_status: IntGaugeVec,
    config_age: GaugeVec,
    up_count: IntGaugeVec,
    total_count: IntGaugeVec,
}

impl PrometheusGatewayMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let checkin_status = IntGaugeVec::new(
            Opts::new(
                "gateway_checkin_status",
                "1 if the gateway checked in within the staleness threshold, 0 otherwise",
            )
            .namespace("checkind"),
            &["network_id", "gateway_id"],
        )?;
        let config_age = GaugeVec::new(
            Opts::new(
                "gateway_config_age_seconds",
                "Age of the gateway's current configuration in seconds",
            )
            .namespace("checkind"),
            &["network_id", "gateway_id"],
        )?;
        let up_count = IntGaugeVec::new(
            Opts::new("gateway_up_count", "Number of live gateways in the network")
                .namespace("checkind"),
            &["network_id"],
        )?;
        let total_count = IntGaugeVec::new(
            Opts::new("gateway_total_count", "Number of gateways in the network")
                .namespace("checkind"),
            &["network_id"],
        )?;

        registry.register(Box::new(checkin_status.clone()))?;
        registry.register(Box::new(config_age.clone()))?;
        registry.register(Box::new(up_count.clone()))?;
        registry.register(Box::new(total_count.clone()))?;

        Ok(Self {
            checkin_status,
            config_age,
            up_count,
            total_count,
        })
    }
}

impl MetricsSink for PrometheusGatewayMetrics {
    fn set_gateway_up(&self, network_id: &str, gateway_id: &str, up: bool) {
        self.checkin_status
            .with_label_values(&[network_id, gateway_id])
            .set(i64::from(up));
    }

    fn set_config_age(&self, network_id: &str, gateway_id: &str, age_secs: f64) {
        self.config_age
            .with_label_values(&[network_id, gateway_id])
            .set(age_secs);
    }

    fn set_network_counts(&self, network_id: &str, up: usize, total: usize) {
        self.up_count
            .with_label_values(&[network_id])
            .set(up as i64);
        self.total_count
            .with_label_values(&[network_id])
            .set(total as i64);
    }
}
