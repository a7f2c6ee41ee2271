//! 服务注册表错误

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// 服务名未注册
    #[error("Service '{0}' is not registered")]
    NotRegistered(String),

    /// 已注册但端口为 0，不可用
    #[error("Service '{0}' is registered without a usable port")]
    Unavailable(String),

    /// 拨号失败或超时
    #[error("Failed to connect to service '{service}': {reason}")]
    Connection { service: String, reason: String },

    /// 地址无法构造为合法的 endpoint
    #[error("Invalid address '{address}' for service '{service}'")]
    InvalidAddress { service: String, address: String },
}

impl RegistryError {
    pub fn connection(service: &str, reason: impl std::fmt::Display) -> Self {
        Self::Connection {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }
}
