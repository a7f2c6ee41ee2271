//! Checkin 服务数据类型定义
//!
//! `CheckinRequest` 是网关上报的遥测载荷，对本服务而言是不透明数据：
//! 仅 `platform_info.config_info.mconfig_created_at` 会被状态上报器读取。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 网关上报的 checkin 载荷
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckinRequest {
    /// 客户端声明的网关硬件 ID（仅存储，不用于鉴权）
    pub gateway_id: String,
    pub magma_pkg_version: String,
    pub status: Option<ServiceStatus>,
    pub system_status: Option<SystemStatus>,
    pub platform_info: Option<PlatformInfo>,
    pub machine_info: Option<MachineInfo>,
    pub vpn_ip: String,
    pub kernel_version: String,
    pub kernel_versions_installed: Vec<String>,
}

impl CheckinRequest {
    /// Config generation timestamp (seconds) embedded in the payload, if any.
    pub fn config_created_at(&self) -> Option<u64> {
        self.platform_info
            .as_ref()
            .and_then(|p| p.config_info.as_ref())
            .map(|c| c.mconfig_created_at)
            .filter(|ts| *ts != 0)
    }
}

/// Per-service metadata reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceStatus {
    pub meta: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemStatus {
    /// 网关本地时间（毫秒）
    pub time: u64,
    pub uptime_secs: u64,
    pub cpu_user: u64,
    pub cpu_system: u64,
    pub cpu_idle: u64,
    pub mem_total: u64,
    pub mem_available: u64,
    pub mem_used: u64,
    pub mem_free: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
    pub disk_partitions: Vec<DiskPartition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskPartition {
    pub device: String,
    pub mount_point: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformInfo {
    pub vpn_ip: String,
    pub packages: Vec<Package>,
    pub kernel_version: String,
    pub kernel_versions_installed: Vec<String>,
    pub config_info: Option<ConfigInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Package {
    pub name: String,
    pub version: String,
}

/// 网关当前生效配置的元信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigInfo {
    /// 配置生成时间（Unix 秒），0 表示未知
    pub mconfig_created_at: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineInfo {
    pub cpu_info: Option<CpuInfo>,
    pub network_info: Option<NetworkInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuInfo {
    pub core_count: u32,
    pub threads_per_core: u32,
    pub architecture: String,
    pub model_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInfo {
    pub network_interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInterface {
    pub network_interface_id: String,
    pub mac_address: String,
    pub ip_addresses: Vec<String>,
}

/// 持久化的网关状态记录，每个 (network, logical id) 一条
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// 服务端收到 checkin 的时间（Unix 毫秒）
    pub time: u64,
    pub checkin: Option<CheckinRequest>,
    /// 网关证书过期时间（Unix 秒）
    #[serde(default)]
    pub cert_expiration_time: i64,
}

impl GatewayStatus {
    /// Deterministic encoding used for the status table.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// 按 (network, logical id) 定位一条状态记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatusRequest {
    pub network_id: String,
    pub logical_id: String,
}

impl GatewayStatusRequest {
    pub fn new(network_id: impl Into<String>, logical_id: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            logical_id: logical_id.into(),
        }
    }
}

/// 下发给网关的远程指令，目前保留，始终为 `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinAction {
    #[default]
    None,
}

/// Checkin 响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinResponse {
    pub action: CheckinAction,
    /// 服务端时间（Unix 毫秒）
    pub time: u64,
}

/// 列出网络中有状态记录的网关
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListGatewaysResponse {
    pub gateway_ids: Vec<String>,
}
