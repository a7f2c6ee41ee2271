//! 内存存储后端
//!
//! 进程内 `HashMap`，重启后数据丢失。用于开发环境和测试。

use crate::error::{CheckinError, CheckinResult};
use crate::kv::backend::KvBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

type Tables = HashMap<String, HashMap<String, Vec<u8>>>;

/// 内存存储后端
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn init(&self) -> CheckinResult<()> {
        Ok(())
    }

    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> CheckinResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value);
        trace!("memory put: table={}, key={}", table, key);
        Ok(())
    }

    async fn get(&self, table: &str, key: &str) -> CheckinResult<Vec<u8>> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .and_then(|t| t.get(key))
            .cloned()
            .ok_or_else(|| CheckinError::not_found(table, key))
    }

    async fn delete(&self, table: &str, key: &str) -> CheckinResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(t) = tables.get_mut(table) {
            t.remove(key);
        }
        Ok(())
    }

    async fn list_keys(&self, table: &str) -> CheckinResult<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_table(&self, table: &str) -> CheckinResult<()> {
        self.tables.write().await.remove(table);
        Ok(())
    }
}
