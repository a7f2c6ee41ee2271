//! checkind 主程序的顶层错误

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] checkind_common::ConfigError),

    /// common crate 聚合错误
    #[error("Base library error: {0}")]
    Base(Box<checkind_common::BaseError>),

    #[error("Checkin service error: {0}")]
    Checkin(#[from] checkin::CheckinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// 后台任务 panic 或被取消
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Service startup failed: {message}")]
    ServiceStartup { message: String },

    #[error("Service configuration validation failed: {message}")]
    ServiceValidation { message: String },

    #[error("Legacy error: {0}")]
    Anyhow(#[from] anyhow::Error),

    #[error("Application error: {message}")]
    Custom { message: String },
}

impl From<checkind_common::BaseError> for Error {
    fn from(err: checkind_common::BaseError) -> Self {
        Error::Base(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    pub fn service_startup(message: impl Into<String>) -> Self {
        Self::ServiceStartup {
            message: message.into(),
        }
    }

    pub fn service_validation(message: impl Into<String>) -> Self {
        Self::ServiceValidation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::custom("test error");
        assert!(matches!(err, Error::Custom { .. }));
        assert_eq!(err.to_string(), "Application error: test error");
    }

    #[test]
    fn test_checkin_error_conversion() {
        let err: Error = checkin::CheckinError::Validation("empty gateway id".into()).into();
        assert!(matches!(err, Error::Checkin(_)));
        assert!(err.to_string().contains("empty gateway id"));
    }

    #[test]
    fn test_base_error_is_boxed() {
        let err: Error = checkind_common::BaseError::internal("boom").into();
        assert!(matches!(err, Error::Base(_)));
    }
}
