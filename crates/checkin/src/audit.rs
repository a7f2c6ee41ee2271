//! 状态写入审计日志
//!
//! 每次状态写入成功后提交一条审计记录。提交不会阻塞，也不会让写入失败：
//! 记录进入有界队列，由后台任务转交给 `AuditSink`；队列满或已关闭时直接丢弃。

use crate::error::CheckinResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// 默认队列容量
pub const DEFAULT_AUDIT_QUEUE_CAPACITY: usize = 1024;

/// 一条网关状态写入记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub network_id: String,
    pub logical_id: String,
    /// 已验证的硬件 ID
    pub hardware_id: String,
    /// 状态记录的服务端时间（Unix 毫秒）
    pub time: u64,
}

/// 审计记录的最终去向
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> CheckinResult<()>;
}

/// 以结构化 tracing 事件输出审计记录
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> CheckinResult<()> {
        info!(
            target: "checkind::audit",
            network_id = %record.network_id,
            logical_id = %record.logical_id,
            hardware_id = %record.hardware_id,
            time = record.time,
            "gateway status updated"
        );
        Ok(())
    }
}

/// 异步审计日志器
///
/// 克隆共享同一个队列。`disabled()` 得到的实例丢弃所有记录。
#[derive(Clone, Debug)]
pub struct AuditLogger {
    sender: Option<mpsc::Sender<AuditRecord>>,
}

impl AuditLogger {
    /// 创建日志器并启动后台转发任务（需要在 tokio runtime 中调用）
    pub fn new(sink: Arc<dyn AuditSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditRecord>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = sink.record(&record).await {
                    warn!(
                        "Audit sink failed for {}/{}: {}",
                        record.network_id, record.logical_id, e
                    );
                }
            }
            debug!("Audit worker stopped");
        });

        Self { sender: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// 提交一条记录，返回是否入队
    pub fn submit(&self, record: AuditRecord) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };

        match sender.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(record)) => {
                debug!(
                    "Audit queue full, dropping record for {}/{}",
                    record.network_id, record.logical_id
                );
                false
            }
            Err(TrySendError::Closed(record)) => {
                debug!(
                    "Audit worker gone, dropping record for {}/{}",
                    record.network_id, record.logical_id
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckinError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn record(logical_id: &str) -> AuditRecord {
        AuditRecord {
            network_id: "net1".into(),
            logical_id: logical_id.into(),
            hardware_id: "hw1".into(),
            time: 1,
        }
    }

    #[derive(Default)]
    struct CountingSink {
        seen: AtomicUsize,
        notify: Notify,
    }

    #[async_trait]
    impl AuditSink for CountingSink {
        async fn record(&self, _record: &AuditRecord) -> CheckinResult<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_one();
            Ok(())
        }
    }

    struct StalledSink;

    #[async_trait]
    impl AuditSink for StalledSink {
        async fn record(&self, _record: &AuditRecord) -> CheckinResult<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_records_reach_sink() {
        let sink = Arc::new(CountingSink::default());
        let logger = AuditLogger::new(sink.clone(), 8);

        assert!(logger.submit(record("gw1")));
        tokio::time::timeout(Duration::from_secs(1), sink.notify.notified())
            .await
            .unwrap();
        assert_eq!(sink.seen.load(Ordering::SeqCst), 1);
    }

    /// 前 `failures` 次调用失败，之后计数
    struct RecoveringSink {
        failures: usize,
        calls: AtomicUsize,
        delivered: AtomicUsize,
        notify: Notify,
    }

    #[async_trait]
    impl AuditSink for RecoveringSink {
        async fn record(&self, _record: &AuditRecord) -> CheckinResult<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(CheckinError::Io("audit backend down".into()));
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_one();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failing_sink_keeps_worker_alive() {
        let sink = Arc::new(RecoveringSink {
            failures: 3,
            calls: AtomicUsize::new(0),
            delivered: AtomicUsize::new(0),
            notify: Notify::new(),
        });
        let logger = AuditLogger::new(sink.clone(), 8);

        for i in 0..4 {
            assert!(logger.submit(record(&format!("gw{i}"))));
        }

        // 第 4 条只有在 worker 熬过前 3 次失败后才会送达
        tokio::time::timeout(Duration::from_secs(1), sink.notify.notified())
            .await
            .expect("worker should survive sink failures");
        assert_eq!(sink.calls.load(Ordering::SeqCst), 4);
        assert_eq!(sink.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stalled_sink_drops_instead_of_blocking() {
        let logger = AuditLogger::new(Arc::new(StalledSink), 1);

        let accepted = tokio::time::timeout(Duration::from_secs(1), async {
            (0..16).filter(|i| logger.submit(record(&format!("gw{i}")))).count()
        })
        .await
        .unwrap();

        // 至多一条在 worker 中，一条在队列中
        assert!(accepted <= 2);
        assert!(accepted >= 1);
    }

    #[test]
    fn test_disabled_logger_drops() {
        let logger = AuditLogger::disabled();
        assert!(!logger.is_enabled());
        assert!(!logger.submit(record("gw1")));
    }
}
