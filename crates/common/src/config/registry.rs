//! 服务注册表配置
//!
//! ```toml
//! [registry]
//! dial_timeout_secs = 10
//!
//! [[registry.services]]
//! name = "directoryd"
//! host = "127.0.0.1"
//! port = 9100
//! ```

use crate::registry::{DialConfig, ServiceLocation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    /// 单次 `get_connection` 的总超时（秒）
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,

    /// 启动时加载的服务地址
    #[serde(default)]
    pub services: Vec<ServiceLocation>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            dial_timeout_secs: default_dial_timeout_secs(),
            services: Vec::new(),
        }
    }
}

fn default_dial_timeout_secs() -> u64 {
    10
}

impl RegistryConfig {
    pub fn dial_config(&self) -> DialConfig {
        DialConfig {
            timeout: Duration::from_secs(self.dial_timeout_secs),
            ..Default::default()
        }
    }

    /// 返回发现的问题，`Warning:` 开头的条目不致命
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.dial_timeout_secs == 0 {
            errors.push("registry.dial_timeout_secs must be greater than 0".to_string());
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() {
                errors.push("registry.services entry has an empty name".to_string());
                continue;
            }
            if service.host.trim().is_empty() {
                errors.push(format!("Service '{}' has an empty host", service.name));
            }
            if service.port == 0 {
                errors.push(format!(
                    "Warning: Service '{}' has port 0 and will be reported as unavailable",
                    service.name
                ));
            }
            if !seen.insert(service.name.as_str()) {
                errors.push(format!(
                    "Warning: Service '{}' is listed more than once, the last entry wins",
                    service.name
                ));
            }
        }

        errors
    }
}
