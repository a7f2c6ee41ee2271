//! Checkin 服务
//!
//! 在写入状态前校验调用方身份：
//!
//! - 无身份 → `PermissionDenied`
//! - 有身份但未注册（network 或 logical id 为空）→ `PermissionDenied`
//! - 已注册 → 以已验证的硬件 ID 覆盖 payload 中的 `gateway_id` 后写入
//!
//! 读取、列举和删除操作直接透传存储层，保留其错误语义。

use crate::error::{CheckinError, CheckinResult};
use crate::identity::{CallContext, IdentityResolver};
use crate::store::CheckinStore;
use crate::types::{
    CheckinAction, CheckinRequest, CheckinResponse, GatewayStatus, GatewayStatusRequest,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// 当前 Unix 时间（毫秒）
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[derive(Clone)]
pub struct CheckinService {
    store: CheckinStore,
    resolver: Arc<dyn IdentityResolver>,
}

impl CheckinService {
    pub fn new(store: CheckinStore, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { store, resolver }
    }

    pub fn store(&self) -> &CheckinStore {
        &self.store
    }

    pub async fn checkin(
        &self,
        ctx: &CallContext,
        mut req: CheckinRequest,
    ) -> CheckinResult<CheckinResponse> {
        let Some(identity) = self.resolver.resolve(ctx, &req).await? else {
            warn!("Rejected checkin without gateway identity");
            return Err(CheckinError::PermissionDenied("missing identity".into()));
        };

        if !identity.is_registered() {
            warn!(
                "Rejected checkin from unregistered gateway {}",
                identity.hardware_id
            );
            return Err(CheckinError::PermissionDenied(format!(
                "gateway {} is not registered",
                identity.hardware_id
            )));
        }

        if req.gateway_id != identity.hardware_id {
            debug!(
                "Overriding reported gateway id '{}' with {}",
                req.gateway_id, identity.hardware_id
            );
            req.gateway_id = identity.hardware_id.clone();
        }

        let time = now_millis();
        let status = GatewayStatus {
            time,
            checkin: Some(req),
            cert_expiration_time: identity.cert_expiration_time,
        };

        self.store
            .update_registered_gateway_status(&identity.network_id, &identity.logical_id, status)
            .await?;

        Ok(CheckinResponse {
            action: CheckinAction::None,
            time,
        })
    }

    pub async fn get_status(&self, req: &GatewayStatusRequest) -> CheckinResult<GatewayStatus> {
        self.store.get_gateway_status(req).await
    }

    pub async fn delete_gateway_status(&self, req: &GatewayStatusRequest) -> CheckinResult<()> {
        self.store.delete_gateway_status(req).await
    }

    pub async fn delete_network(&self, network_id: &str) -> CheckinResult<()> {
        self.store.delete_network_table(network_id).await
    }

    pub async fn list(&self, network_id: &str) -> CheckinResult<Vec<String>> {
        self.store.list(network_id).await
    }
}
