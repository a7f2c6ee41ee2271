//! OpenTelemetry 追踪配置
//!
//! 仅在编译时启用 `opentelemetry` feature 时生效，span 通过 OTLP gRPC 导出。

use serde::{Deserialize, Serialize};

/// `[observability.tracing]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    #[serde(default)]
    pub enable: bool,

    /// 追踪后端中显示的服务名
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OTLP gRPC 端点，如 `http://otel-collector:4317`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// 采样比例，取值 0.0 ~ 1.0
    #[serde(default = "default_sample_ratio")]
    pub sample_ratio: f64,
}

fn default_service_name() -> String {
    "checkind".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:4317".to_string()
}

fn default_sample_ratio() -> f64 {
    1.0
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enable: false,
            service_name: default_service_name(),
            endpoint: default_endpoint(),
            sample_ratio: default_sample_ratio(),
        }
    }
}

impl TracingConfig {
    pub fn is_enabled(&self) -> bool {
        self.enable
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// 未启用时不检查端点
    pub fn validate(&self) -> Result<(), String> {
        if !self.enable {
            return Ok(());
        }
        if self.endpoint.trim().is_empty() {
            return Err("Tracing endpoint cannot be empty when tracing is enabled".to_string());
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(format!(
                "Tracing endpoint '{}' must start with http:// or https://",
                self.endpoint
            ));
        }
        if !(0.0..=1.0).contains(&self.sample_ratio) {
            return Err(format!(
                "Tracing sample_ratio {} must be between 0.0 and 1.0",
                self.sample_ratio
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TracingConfig::default();
        assert!(!config.is_enabled());
        assert_eq!(config.service_name(), "checkind");
        assert_eq!(config.endpoint(), "http://127.0.0.1:4317");
        assert_eq!(config.sample_ratio, 1.0);
    }

    #[test]
    fn test_validation() {
        let mut config = TracingConfig {
            endpoint: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.enable = true;
        assert!(config.validate().is_err());

        config.endpoint = "tempo:4317".to_string();
        assert!(config.validate().is_err());

        config.endpoint = "https://tempo:4317".to_string();
        assert!(config.validate().is_ok());

        config.sample_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize() {
        let config: TracingConfig = toml::from_str(
            r#"
            enable = true
            endpoint = "http://jaeger:4317"
            sample_ratio = 0.25
            "#,
        )
        .unwrap();
        assert!(config.is_enabled());
        assert_eq!(config.service_name(), "checkind");
        assert_eq!(config.endpoint(), "http://jaeger:4317");
        assert_eq!(config.sample_ratio, 0.25);
    }
}
