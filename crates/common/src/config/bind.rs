use serde::{Deserialize, Serialize};

/// 网络绑定配置
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BindConfig {
    /// HTTP API 绑定
    #[serde(default)]
    pub http: HttpBindConfig,
}

/// HTTP 服务绑定配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpBindConfig {
    /// 绑定 IP 地址
    ///
    /// 通常使用 "0.0.0.0" 监听所有接口。
    pub ip: String,

    /// 绑定端口
    pub port: u16,
}

impl Default for HttpBindConfig {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 9110,
        }
    }
}

impl HttpBindConfig {
    /// `ip:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}
