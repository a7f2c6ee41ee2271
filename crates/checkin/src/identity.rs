//! 网关身份解析
//!
//! 网关身份由上游认证层（mTLS 终结点）验证后，以请求头的形式带入本服务：
//!
//! - `x-gateway-hardware-id`
//! - `x-gateway-network-id`
//! - `x-gateway-logical-id`
//! - `x-gateway-cert-expiration`（Unix 秒，可选）
//!
//! 本服务信任这些头部，但不信任 payload 中客户端自报的 `gateway_id`。

use crate::directory::{DirectoryError, GatewayDirectory};
use crate::error::{CheckinError, CheckinResult};
use crate::types::CheckinRequest;
use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const HARDWARE_ID_HEADER: &str = "x-gateway-hardware-id";
pub const NETWORK_ID_HEADER: &str = "x-gateway-network-id";
pub const LOGICAL_ID_HEADER: &str = "x-gateway-logical-id";
pub const CERT_EXPIRATION_HEADER: &str = "x-gateway-cert-expiration";

/// 已验证的网关身份
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayIdentity {
    pub hardware_id: String,
    pub network_id: String,
    pub logical_id: String,
    /// 客户端证书过期时间（Unix 秒）
    pub cert_expiration_time: i64,
}

impl GatewayIdentity {
    /// A gateway is registered once the directory has assigned it both a
    /// network and a logical id.
    pub fn is_registered(&self) -> bool {
        !self.network_id.is_empty() && !self.logical_id.is_empty()
    }
}

/// 单次调用的上下文
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub identity: Option<GatewayIdentity>,
}

impl CallContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: GatewayIdentity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// 从请求头构建上下文
    ///
    /// 没有 `x-gateway-hardware-id` 头（或为空）时视为无身份。
    pub fn from_headers(headers: &HeaderMap) -> CheckinResult<Self> {
        let hardware_id = header_str(headers, HARDWARE_ID_HEADER)?;
        if hardware_id.is_empty() {
            return Ok(Self::anonymous());
        }

        let cert_expiration_time = match header_str(headers, CERT_EXPIRATION_HEADER)? {
            "" => 0,
            raw => raw.parse::<i64>().map_err(|e| {
                CheckinError::Validation(format!(
                    "Invalid {CERT_EXPIRATION_HEADER} header '{raw}': {e}"
                ))
            })?,
        };

        Ok(Self::with_identity(GatewayIdentity {
            hardware_id: hardware_id.to_string(),
            network_id: header_str(headers, NETWORK_ID_HEADER)?.to_string(),
            logical_id: header_str(headers, LOGICAL_ID_HEADER)?.to_string(),
            cert_expiration_time,
        }))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> CheckinResult<&'a str> {
    match headers.get(name) {
        Some(value) => value
            .to_str()
            .map(str::trim)
            .map_err(|_| CheckinError::Validation(format!("Header {name} is not valid ASCII"))),
        None => Ok(""),
    }
}

/// 为一次 checkin 确定调用方身份
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(
        &self,
        ctx: &CallContext,
        req: &CheckinRequest,
    ) -> CheckinResult<Option<GatewayIdentity>>;
}

/// 生产模式：身份必须由上游写入上下文
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextIdentityResolver;

#[async_trait]
impl IdentityResolver for ContextIdentityResolver {
    async fn resolve(
        &self,
        ctx: &CallContext,
        _req: &CheckinRequest,
    ) -> CheckinResult<Option<GatewayIdentity>> {
        Ok(ctx.identity.clone())
    }
}

/// 测试/开发模式：上下文没有身份时，按 payload 中的 `gateway_id` 查询目录合成身份
///
/// 目录中找不到的硬件 ID 会得到一个未注册的身份。
#[derive(Clone)]
pub struct DirectoryIdentityResolver {
    directory: Arc<dyn GatewayDirectory>,
}

impl DirectoryIdentityResolver {
    pub fn new(directory: Arc<dyn GatewayDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl IdentityResolver for DirectoryIdentityResolver {
    async fn resolve(
        &self,
        ctx: &CallContext,
        req: &CheckinRequest,
    ) -> CheckinResult<Option<GatewayIdentity>> {
        if let Some(identity) = &ctx.identity {
            return Ok(Some(identity.clone()));
        }
        if req.gateway_id.is_empty() {
            return Ok(None);
        }

        let hardware_id = req.gateway_id.clone();
        let network_id = match self.directory.find_gateway_network_id(&hardware_id).await {
            Ok(network_id) => network_id,
            Err(DirectoryError::UnknownHardwareId(_)) => {
                debug!("Synthesized unregistered identity for {}", hardware_id);
                return Ok(Some(GatewayIdentity {
                    hardware_id,
                    ..Default::default()
                }));
            }
            Err(e) => return Err(e.into()),
        };
        let logical_id = self
            .directory
            .find_gateway_id(&network_id, &hardware_id)
            .await?;

        Ok(Some(GatewayIdentity {
            hardware_id,
            network_id,
            logical_id,
            cert_expiration_time: 0,
        }))
    }
}
