//! 网关状态存储
//!
//! 每个网络一张逻辑表 `<network_id>_gwstatus`，以 logical id 为键，值为整条
//! `GatewayStatus` 的序列化字节。记录只会被整体覆盖，不会自动过期。

use crate::audit::{AuditLogger, AuditRecord};
use crate::directory::GatewayDirectory;
use crate::error::{CheckinError, CheckinResult};
use crate::kv::KvStore;
use crate::types::{GatewayStatus, GatewayStatusRequest};
use std::sync::Arc;
use tracing::{debug, info};

const STATUS_TABLE_SUFFIX: &str = "_gwstatus";

/// 网络状态表名
pub fn status_table(network_id: &str) -> String {
    format!("{network_id}{STATUS_TABLE_SUFFIX}")
}

/// Checkin 状态存储
#[derive(Clone)]
pub struct CheckinStore {
    kv: KvStore,
    directory: Arc<dyn GatewayDirectory>,
    audit: AuditLogger,
}

impl CheckinStore {
    pub fn new(kv: KvStore, directory: Arc<dyn GatewayDirectory>, audit: AuditLogger) -> Self {
        Self {
            kv,
            directory,
            audit,
        }
    }

    pub fn directory(&self) -> &Arc<dyn GatewayDirectory> {
        &self.directory
    }

    pub fn backend_name(&self) -> &'static str {
        self.kv.backend_name()
    }

    /// 按 payload 中的 gateway id（硬件 ID）查询目录后写入
    ///
    /// 目录查询失败原样返回。
    pub async fn update_gateway_status(&self, status: GatewayStatus) -> CheckinResult<()> {
        let hardware_id = match &status.checkin {
            Some(checkin) if !checkin.gateway_id.is_empty() => checkin.gateway_id.clone(),
            Some(_) => {
                return Err(CheckinError::Validation(
                    "Gateway status has empty gateway id".into(),
                ));
            }
            None => {
                return Err(CheckinError::Validation(
                    "Gateway status has no checkin".into(),
                ));
            }
        };

        let network_id = self.directory.find_gateway_network_id(&hardware_id).await?;
        let logical_id = self
            .directory
            .find_gateway_id(&network_id, &hardware_id)
            .await?;

        self.update_registered_gateway_status(&network_id, &logical_id, status)
            .await
    }

    /// 写入已知 (network, logical id) 的状态，整体覆盖
    pub async fn update_registered_gateway_status(
        &self,
        network_id: &str,
        logical_id: &str,
        status: GatewayStatus,
    ) -> CheckinResult<()> {
        validate_ids(network_id, logical_id)?;

        let bytes = status.to_bytes()?;
        self.kv
            .put(&status_table(network_id), logical_id, bytes)
            .await?;

        debug!("Stored status for {}/{}", network_id, logical_id);

        self.audit.submit(AuditRecord {
            network_id: network_id.to_string(),
            logical_id: logical_id.to_string(),
            hardware_id: status
                .checkin
                .as_ref()
                .map(|c| c.gateway_id.clone())
                .unwrap_or_default(),
            time: status.time,
        });

        Ok(())
    }

    /// 读取状态，不存在时返回 `CheckinError::NotFound`
    pub async fn get_gateway_status(
        &self,
        req: &GatewayStatusRequest,
    ) -> CheckinResult<GatewayStatus> {
        validate_ids(&req.network_id, &req.logical_id)?;

        let bytes = self
            .kv
            .get(&status_table(&req.network_id), &req.logical_id)
            .await?;
        Ok(GatewayStatus::from_bytes(&bytes)?)
    }

    /// 删除状态（幂等）
    pub async fn delete_gateway_status(&self, req: &GatewayStatusRequest) -> CheckinResult<()> {
        validate_ids(&req.network_id, &req.logical_id)?;

        self.kv
            .delete(&status_table(&req.network_id), &req.logical_id)
            .await
    }

    /// 删除整个网络的状态表，表非空时拒绝
    ///
    /// 先列键再删表，两步之间没有锁：并发的 checkin 可能在检查之后写入并随表一起被删除。
    /// 调用方需自行串行化网络删除。
    pub async fn delete_network_table(&self, network_id: &str) -> CheckinResult<()> {
        if network_id.is_empty() {
            return Err(CheckinError::Validation("Empty network id".into()));
        }

        let table = status_table(network_id);
        let remaining = self.kv.list_keys(&table).await?;
        if !remaining.is_empty() {
            return Err(CheckinError::PreconditionFailed(format!(
                "Network {network_id} still has {} gateway status record(s)",
                remaining.len()
            )));
        }

        self.kv.delete_table(&table).await?;
        info!("Dropped status table {}", table);
        Ok(())
    }

    /// 网络中所有有状态记录的 logical id（无序）
    pub async fn list(&self, network_id: &str) -> CheckinResult<Vec<String>> {
        if network_id.is_empty() {
            return Err(CheckinError::Validation("Empty network id".into()));
        }
        self.kv.list_keys(&status_table(network_id)).await
    }
}

fn validate_ids(network_id: &str, logical_id: &str) -> CheckinResult<()> {
    if network_id.is_empty() {
        return Err(CheckinError::Validation("Empty network id".into()));
    }
    if logical_id.is_empty() {
        return Err(CheckinError::Validation("Empty logical id".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditSink;
    use crate::directory::{DirectoryError, GatewayRecord, StaticDirectory};
    use crate::types::CheckinRequest;

    async fn store_with(records: &[GatewayRecord]) -> CheckinStore {
        let directory = StaticDirectory::from_records(records).await;
        CheckinStore::new(KvStore::memory(), Arc::new(directory), AuditLogger::disabled())
    }

    fn gw1() -> GatewayRecord {
        GatewayRecord {
            network_id: "net1".into(),
            logical_id: "gw1".into(),
            hardware_id: "hw1".into(),
        }
    }

    fn status(hardware_id: &str, time: u64) -> GatewayStatus {
        GatewayStatus {
            time,
            checkin: Some(CheckinRequest {
                gateway_id: hardware_id.into(),
                ..Default::default()
            }),
            cert_expiration_time: 0,
        }
    }

    #[test]
    fn test_status_table_name() {
        assert_eq!(status_table("net1"), "net1_gwstatus");
    }

    #[tokio::test]
    async fn test_round_trip_and_overwrite() {
        let store = store_with(&[gw1()]).await;
        let req = GatewayStatusRequest::new("net1", "gw1");

        store
            .update_registered_gateway_status("net1", "gw1", status("hw1", 1_000))
            .await
            .unwrap();
        store
            .update_registered_gateway_status("net1", "gw1", status("hw1", 2_000))
            .await
            .unwrap();

        let stored = store.get_gateway_status(&req).await.unwrap();
        assert_eq!(stored, status("hw1", 2_000));
        assert_eq!(store.list("net1").await.unwrap(), vec!["gw1"]);
    }

    #[tokio::test]
    async fn test_update_via_directory() {
        let store = store_with(&[gw1()]).await;
        store.update_gateway_status(status("hw1", 5)).await.unwrap();

        let stored = store
            .get_gateway_status(&GatewayStatusRequest::new("net1", "gw1"))
            .await
            .unwrap();
        assert_eq!(stored.time, 5);
    }

    #[tokio::test]
    async fn test_update_rejects_missing_checkin() {
        let store = store_with(&[gw1()]).await;

        let err = store
            .update_gateway_status(GatewayStatus::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckinError::Validation(_)));

        let err = store.update_gateway_status(status("", 1)).await.unwrap_err();
        assert!(matches!(err, CheckinError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_propagates_directory_error() {
        let store = store_with(&[gw1()]).await;
        let err = store
            .update_gateway_status(status("hw-unknown", 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckinError::Directory(DirectoryError::UnknownHardwareId(_))
        ));
        assert!(store.list("net1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = store_with(&[]).await;
        let err = store
            .get_gateway_status(&GatewayStatusRequest::new("net1", "gw1"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_empty_ids_rejected() {
        let store = store_with(&[]).await;
        let err = store
            .get_gateway_status(&GatewayStatusRequest::new("net1", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckinError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = store_with(&[gw1()]).await;
        let req = GatewayStatusRequest::new("net1", "gw1");
        store
            .update_registered_gateway_status("net1", "gw1", status("hw1", 1))
            .await
            .unwrap();

        store.delete_gateway_status(&req).await.unwrap();
        store.delete_gateway_status(&req).await.unwrap();
        assert!(store.get_gateway_status(&req).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_network_requires_empty_table() {
        let store = store_with(&[gw1()]).await;
        store
            .update_registered_gateway_status("net1", "gw1", status("hw1", 1))
            .await
            .unwrap();

        let err = store.delete_network_table("net1").await.unwrap_err();
        assert!(matches!(err, CheckinError::PreconditionFailed(_)));

        store
            .delete_gateway_status(&GatewayStatusRequest::new("net1", "gw1"))
            .await
            .unwrap();
        store.delete_network_table("net1").await.unwrap();
        assert!(store.list("net1").await.unwrap().is_empty());
        assert!(
            store
                .get_gateway_status(&GatewayStatusRequest::new("net1", "gw1"))
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    struct FailingSink;

    #[async_trait::async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _record: &AuditRecord) -> CheckinResult<()> {
            Err(CheckinError::Io("audit backend down".into()))
        }
    }

    struct StalledSink;

    #[async_trait::async_trait]
    impl AuditSink for StalledSink {
        async fn record(&self, _record: &AuditRecord) -> CheckinResult<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    async fn store_with_sink(sink: Arc<dyn AuditSink>) -> CheckinStore {
        let directory = StaticDirectory::from_records(&[gw1()]).await;
        CheckinStore::new(KvStore::memory(), Arc::new(directory), AuditLogger::new(sink, 1))
    }

    #[tokio::test]
    async fn test_stalled_audit_sink_never_blocks_writes() {
        let store = store_with_sink(Arc::new(StalledSink)).await;

        // 队列容量 1，worker 卡住后后续审计记录全部丢弃
        for time in 1..=20 {
            tokio::time::timeout(
                std::time::Duration::from_secs(1),
                store.update_registered_gateway_status("net1", "gw1", status("hw1", time)),
            )
            .await
            .expect("write should not wait on the audit sink")
            .unwrap();
        }

        let stored = store
            .get_gateway_status(&GatewayStatusRequest::new("net1", "gw1"))
            .await
            .unwrap();
        assert_eq!(stored.time, 20);
    }

    #[tokio::test]
    async fn test_failing_audit_sink_does_not_fail_writes() {
        let store = store_with_sink(Arc::new(FailingSink)).await;

        for time in 1..=5 {
            store.update_gateway_status(status("hw1", time)).await.unwrap();
        }

        let stored = store
            .get_gateway_status(&GatewayStatusRequest::new("net1", "gw1"))
            .await
            .unwrap();
        assert_eq!(stored.time, 5);
    }

    #[tokio::test]
    async fn test_networks_are_isolated() {
        let store = store_with(&[]).await;
        store
            .update_registered_gateway_status("net1", "gw1", status("hw1", 1))
            .await
            .unwrap();
        store
            .update_registered_gateway_status("net2", "gw1", status("hw2", 2))
            .await
            .unwrap();

        store
            .delete_gateway_status(&GatewayStatusRequest::new("net1", "gw1"))
            .await
            .unwrap();
        assert_eq!(store.list("net2").await.unwrap(), vec!["gw1"]);
    }
}
