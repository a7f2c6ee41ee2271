//! 顶层错误枚举
//!
//! 聚合配置、服务注册表和 checkin 服务的错误

use super::ConfigError;
use crate::registry::RegistryError;
use checkin::CheckinError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BaseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Checkin error: {0}")]
    Checkin(#[from] CheckinError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 内部错误（通常表示编程错误）
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BaseError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let err: BaseError = RegistryError::NotRegistered("svc".into()).into();
        assert_eq!(err.to_string(), "Registry error: Service 'svc' is not registered");

        let err: BaseError = ConfigError::Invalid {
            errors: vec!["a".into(), "b".into()],
        }
        .into();
        assert_eq!(err.to_string(), "Configuration error: Invalid configuration: a; b");

        let err: BaseError = CheckinError::Validation("empty".into()).into();
        assert!(matches!(err, BaseError::Checkin(_)));
    }
}
