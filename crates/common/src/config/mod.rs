//! 统一配置管理
//!
//! checkind 只读取一个 TOML 文件。顶层段落：
//!
//! - `name` / `env` / `pid`
//! - `[bind.http]`：HTTP API 监听地址
//! - `[storage]` `[reporter]` `[audit]` `[identity]` `[directory]`：checkin 服务
//! - `[registry]`：服务注册表
//! - `[observability]`：日志与追踪

pub mod bind;
pub mod registry;
pub mod tracing;

pub use crate::config::bind::{BindConfig, HttpBindConfig};
pub use crate::config::registry::RegistryConfig;
pub use crate::config::tracing::TracingConfig;

use crate::error::ConfigError;
use checkin::{CheckinServiceConfig, IdentityMode, StorageBackend};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// checkind 主配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CheckindConfig {
    /// 实例名称，用于日志和追踪中区分节点
    pub name: String,

    /// 运行环境："dev" | "prod" | "test"
    pub env: String,

    /// PID 文件路径（可选）
    #[serde(default)]
    pub pid: Option<String>,

    #[serde(default)]
    pub bind: BindConfig,

    /// Checkin 服务配置，各段落平铺在顶层
    #[serde(flatten)]
    pub checkin: CheckinServiceConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// 可观测性配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
    /// EnvFilter 语法（如 "info,sqlx=warn"），RUST_LOG 优先
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub tracing: TracingConfig,
}

/// 日志配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// "console"（默认）或 "file"
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 按天轮转，仅 output = "file" 时有效
    #[serde(default)]
    pub rotate: bool,

    /// 日志目录，仅 output = "file" 时有效
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter_level: default_filter_level(),
            log: LogConfig::default(),
            tracing: TracingConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

fn default_filter_level() -> String {
    "info".to_string()
}

impl Default for CheckindConfig {
    fn default() -> Self {
        Self {
            name: "checkind-default".to_string(),
            env: "dev".to_string(),
            pid: None,
            bind: BindConfig::default(),
            checkin: CheckinServiceConfig::default(),
            registry: RegistryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl CheckindConfig {
    pub fn observability_config(&self) -> &ObservabilityConfig {
        &self.observability
    }

    pub fn tracing_config(&self) -> &TracingConfig {
        &self.observability.tracing
    }

    pub fn log_config(&self) -> &LogConfig {
        &self.observability.log
    }

    pub fn is_console_logging(&self) -> bool {
        self.observability.log.output == "console"
    }

    /// 过滤级别，优先使用非空的 RUST_LOG
    pub fn get_filter_level(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.observability.filter_level.clone())
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path_ref.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path_ref).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })?;

        Self::from_toml(&content).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// 验证配置
    ///
    /// 一次返回所有问题。以 `Warning:` 开头的条目不阻止启动。
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Instance name cannot be empty".to_string());
        }

        if !["dev", "prod", "test"].contains(&self.env.as_str()) {
            errors.push(format!(
                "Invalid environment '{}', must be one of: dev, prod, test",
                self.env
            ));
        }

        if self.bind.http.ip.parse::<std::net::IpAddr>().is_err() {
            errors.push(format!(
                "Invalid bind.http.ip '{}', must be a valid IP address",
                self.bind.http.ip
            ));
        }
        if self.bind.http.port == 0 {
            errors.push(
                "Warning: bind.http.port is 0, an ephemeral port will be chosen".to_string(),
            );
        }

        // 存储
        let storage = &self.checkin.storage;
        if storage.backend == StorageBackend::Sqlite && storage.sqlite_path.trim().is_empty() {
            errors.push("storage.sqlite_path cannot be empty for the sqlite backend".to_string());
        }
        if storage.backend == StorageBackend::Memory && self.env == "prod" {
            errors.push(
                "Warning: Production environment uses the memory storage backend, gateway statuses are lost on restart"
                    .to_string(),
            );
        }

        // 上报器
        let reporter = &self.checkin.reporter;
        if reporter.interval_secs == 0 {
            errors.push("reporter.interval_secs must be greater than 0".to_string());
        }
        if reporter.staleness_threshold_secs == 0 {
            errors.push("reporter.staleness_threshold_secs must be greater than 0".to_string());
        }
        if reporter.staleness_threshold_secs < reporter.interval_secs {
            errors.push(format!(
                "Warning: reporter.staleness_threshold_secs ({}) is shorter than reporter.interval_secs ({})",
                reporter.staleness_threshold_secs, reporter.interval_secs
            ));
        }

        if self.checkin.audit.enable && self.checkin.audit.queue_capacity == 0 {
            errors.push("audit.queue_capacity must be greater than 0".to_string());
        }

        if self.checkin.identity.mode == IdentityMode::Directory {
            if self.env == "prod" {
                errors.push(
                    "identity.mode = \"directory\" trusts client-reported gateway ids and is not allowed in production"
                        .to_string(),
                );
            } else {
                errors.push(
                    "Warning: identity.mode = \"directory\" trusts client-reported gateway ids"
                        .to_string(),
                );
            }
        }

        // 网关目录
        let mut hardware_ids = HashSet::new();
        let mut slots = HashSet::new();
        for gateway in &self.checkin.directory.gateways {
            if gateway.network_id.is_empty()
                || gateway.logical_id.is_empty()
                || gateway.hardware_id.is_empty()
            {
                errors.push(format!(
                    "directory.gateways entry {}/{} ({}) has an empty id",
                    gateway.network_id, gateway.logical_id, gateway.hardware_id
                ));
            }
            if !slots.insert((gateway.network_id.as_str(), gateway.logical_id.as_str())) {
                errors.push(format!(
                    "Gateway {}/{} is registered more than once in directory.gateways",
                    gateway.network_id, gateway.logical_id
                ));
            }
            if !hardware_ids.insert(gateway.hardware_id.as_str()) {
                errors.push(format!(
                    "Hardware id '{}' is registered more than once in directory.gateways",
                    gateway.hardware_id
                ));
            }
        }

        errors.extend(self.registry.validate());

        // 过滤级别（EnvFilter 语法，只检查第一段）
        let main_level = self
            .observability
            .filter_level
            .split(',')
            .next()
            .unwrap_or("")
            .trim();
        if !["trace", "debug", "info", "warn", "error"].contains(&main_level) {
            errors.push(format!(
                "Invalid filter level '{}', must start with one of: trace, debug, info, warn, error",
                self.observability.filter_level
            ));
        }

        if !["console", "file"].contains(&self.observability.log.output.as_str()) {
            errors.push(format!(
                "Invalid log output '{}' (observability.log.output), must be 'console' or 'file'",
                self.observability.log.output
            ));
        }

        if let Err(e) = self.observability.tracing.validate() {
            errors.push(format!("Tracing configuration error: {e}"));
        }

        if self.env == "prod" && self.is_console_logging() {
            errors.push("Warning: Production environment should use file logging (observability.log.output = \"file\")".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// 过滤出致命错误（非 `Warning:` 开头）
pub fn fatal_errors(errors: &[String]) -> Vec<&String> {
    errors.iter().filter(|e| !e.starts_with("Warning:")).collect()
}
