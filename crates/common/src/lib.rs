//! checkind 通用基础设施
//!
//! 配置模型、顶层错误、Prometheus 指标导出，以及服务注册表。

pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;

// Re-export commonly used types for convenience
pub use config::{CheckindConfig, LogConfig, ObservabilityConfig};
pub use error::{BaseError, ConfigError, Result};
pub use registry::{DialConfig, RegistryError, ServiceLocation, ServiceRegistry};
