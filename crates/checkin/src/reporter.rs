//! 网关存活状态上报器
//!
//! 周期性遍历目录中的所有网络和网关，读取最近一次 checkin 的时间，
//! 按陈旧程度判定存活并输出指标。单个网络或网关的失败不会中断整轮上报。

use crate::config::ReporterConfig;
use crate::metrics::MetricsSink;
use crate::store::CheckinStore;
use crate::types::GatewayStatusRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

/// 存活判定：最近一次 checkin 距今不超过 `threshold_secs` 秒
///
/// `status_time_millis` 晚于 `now_secs` 时视为存活。
pub fn is_gateway_up(now_secs: u64, status_time_millis: u64, threshold_secs: u64) -> bool {
    now_secs.saturating_sub(status_time_millis / 1000) <= threshold_secs
}

/// 单个网络一轮上报的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub network_id: String,
    /// 存活网关数
    pub up: usize,
    /// 目录中的网关总数
    pub total: usize,
    /// 读取状态失败（含从未 checkin）的网关数
    pub missing: usize,
}

pub struct StatusReporter {
    store: CheckinStore,
    metrics: Arc<dyn MetricsSink>,
    interval: Duration,
    threshold_secs: u64,
}

impl StatusReporter {
    pub fn new(store: CheckinStore, metrics: Arc<dyn MetricsSink>, config: &ReporterConfig) -> Self {
        Self {
            store,
            metrics,
            interval: config.interval(),
            threshold_secs: config.staleness_threshold_secs,
        }
    }

    /// 运行上报循环，直到收到关闭信号
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "Status reporter started: interval={:?}, staleness threshold={}s",
            self.interval, self.threshold_secs
        );

        let mut ticker = interval(self.interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summaries = self.report_once().await;
                    debug!("Reported {} network(s)", summaries.len());
                }
                _ = shutdown_rx.recv() => {
                    info!("Status reporter received shutdown signal");
                    break;
                }
            }
        }
    }

    pub async fn report_once(&self) -> Vec<ReportSummary> {
        let now_secs = chrono::Utc::now().timestamp().max(0) as u64;
        self.report_at(now_secs).await
    }

    /// 以给定时刻执行一轮上报
    pub async fn report_at(&self, now_secs: u64) -> Vec<ReportSummary> {
        let directory = self.store.directory();

        let networks = match directory.list_networks().await {
            Ok(networks) => networks,
            Err(e) => {
                error!("Failed to list networks, skipping report: {}", e);
                return Vec::new();
            }
        };

        let mut summaries = Vec::with_capacity(networks.len());
        for network_id in networks {
            let gateways = match directory.list_gateways(&network_id).await {
                Ok(gateways) => gateways,
                Err(e) => {
                    warn!("Failed to list gateways of network {}: {}", network_id, e);
                    continue;
                }
            };

            summaries.push(self.report_network(&network_id, &gateways, now_secs).await);
        }

        summaries
    }

    async fn report_network(
        &self,
        network_id: &str,
        gateways: &[String],
        now_secs: u64,
    ) -> ReportSummary {
        let mut summary = ReportSummary {
            network_id: network_id.to_string(),
            total: gateways.len(),
            ..Default::default()
        };

        for gateway_id in gateways {
            let req = GatewayStatusRequest::new(network_id, gateway_id.as_str());
            let status = match self.store.get_gateway_status(&req).await {
                Ok(status) => status,
                Err(_) => {
                    summary.missing += 1;
                    continue;
                }
            };

            let up = is_gateway_up(now_secs, status.time, self.threshold_secs);
            if up {
                summary.up += 1;
            }
            self.metrics.set_gateway_up(network_id, gateway_id, up);

            if let Some(created_at) = status
                .checkin
                .as_ref()
                .and_then(|checkin| checkin.config_created_at())
            {
                let age = now_secs as f64 - created_at as f64;
                self.metrics.set_config_age(network_id, gateway_id, age);
            }
        }

        self.metrics
            .set_network_counts(network_id, summary.up, summary.total);
        summary
    }
}
