//! 配置加载错误

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `validate()` 返回的致命错误
    #[error("Invalid configuration: {}", .errors.join("; "))]
    Invalid { errors: Vec<String> },
}
