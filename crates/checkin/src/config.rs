//! Checkin 服务配置

use crate::audit::DEFAULT_AUDIT_QUEUE_CAPACITY;
use crate::directory::GatewayRecord;
use crate::kv::StorageConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Checkin 服务配置
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CheckinServiceConfig {
    /// 状态存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 状态上报器配置
    #[serde(default)]
    pub reporter: ReporterConfig,

    /// 审计日志配置
    #[serde(default)]
    pub audit: AuditConfig,

    /// 身份解析配置
    #[serde(default)]
    pub identity: IdentityConfig,

    /// 网关目录初始内容
    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// 状态上报器配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReporterConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    /// 上报间隔（秒）
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// 超过该时长（秒）未 checkin 的网关视为离线
    #[serde(default = "default_staleness_threshold_secs")]
    pub staleness_threshold_secs: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            enable: true,
            interval_secs: default_interval_secs(),
            staleness_threshold_secs: default_staleness_threshold_secs(),
        }
    }
}

impl ReporterConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    60
}

fn default_staleness_threshold_secs() -> u64 {
    300
}

/// 审计日志配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    /// 队列容量，满时丢弃新记录
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enable: true,
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    DEFAULT_AUDIT_QUEUE_CAPACITY
}

/// 身份来源
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    /// 仅信任上游写入的身份头
    #[default]
    Context,
    /// 缺少身份头时按 payload 的 gateway_id 查询目录（仅用于开发和测试）
    Directory,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IdentityConfig {
    #[serde(default)]
    pub mode: IdentityMode,
}

/// `[[directory.gateways]]` 条目
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DirectoryConfig {
    /// 没有网关的网络也需要出现在上报中
    #[serde(default)]
    pub networks: Vec<String>,

    #[serde(default)]
    pub gateways: Vec<GatewayRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::StorageBackend;

    #[test]
    fn test_defaults() {
        let config = CheckinServiceConfig::default();
        assert!(config.reporter.enable);
        assert_eq!(config.reporter.interval(), Duration::from_secs(60));
        assert_eq!(config.reporter.staleness_threshold_secs, 300);
        assert_eq!(config.audit.queue_capacity, DEFAULT_AUDIT_QUEUE_CAPACITY);
        assert_eq!(config.identity.mode, IdentityMode::Context);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [storage]
            backend = "sqlite"

            [reporter]
            interval_secs = 30
            staleness_threshold_secs = 120

            [audit]
            enable = false

            [identity]
            mode = "directory"

            [directory]
            networks = ["empty-net"]

            [[directory.gateways]]
            network_id = "net1"
            logical_id = "gw1"
            hardware_id = "hw1"
        "#;

        let config: CheckinServiceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.reporter.interval_secs, 30);
        assert_eq!(config.reporter.staleness_threshold_secs, 120);
        assert!(config.reporter.enable);
        assert!(!config.audit.enable);
        assert_eq!(config.identity.mode, IdentityMode::Directory);
        assert_eq!(config.directory.networks, vec!["empty-net"]);
        assert_eq!(config.directory.gateways[0].hardware_id, "hw1");
    }
}
