//! 键值存储模块
//!
//! 状态存储所依赖的键值协作者，提供多种后端：内存, SQLite
//!
//! # 设计
//!
//! - `KvBackend` trait 定义统一的异步接口
//! - `KvStore` enum 封装不同的后端实现
//! - 通过 `StorageConfig` 配置选择和初始化后端

pub mod backend;
pub mod config;
pub mod memory;

#[cfg(feature = "backend-sqlite")]
pub mod sqlite;

use crate::error::{CheckinError, CheckinResult};

pub use backend::KvBackend;
pub use config::{StorageBackend, StorageConfig};
pub use memory::MemoryBackend;

#[cfg(feature = "backend-sqlite")]
use sqlite::SqliteBackend;

/// 键值存储统一接口
#[derive(Clone, Debug)]
pub enum KvStore {
    /// 内存存储后端（始终可用）
    Memory(MemoryBackend),

    /// SQLite 存储后端
    #[cfg(feature = "backend-sqlite")]
    Sqlite(Box<SqliteBackend>),
}

impl KvStore {
    /// 从配置创建存储实例
    ///
    /// # Errors
    /// - 后端初始化失败
    /// - 后端功能未启用（feature flag）
    pub async fn from_config(config: &StorageConfig) -> CheckinResult<Self> {
        match config.backend {
            StorageBackend::Memory => Ok(Self::memory()),

            #[cfg(feature = "backend-sqlite")]
            StorageBackend::Sqlite => {
                let path = std::path::Path::new(&config.sqlite_path);
                if !path.exists() {
                    std::fs::create_dir_all(path).map_err(|e| {
                        CheckinError::Config(format!(
                            "Failed to create SQLite directory {}: {e}",
                            path.display()
                        ))
                    })?;
                }
                let backend = SqliteBackend::new(path).await?;
                Ok(Self::Sqlite(Box::new(backend)))
            }

            #[cfg(not(feature = "backend-sqlite"))]
            StorageBackend::Sqlite => Err(CheckinError::Config(
                "SQLite backend not enabled. Compile with --features backend-sqlite".into(),
            )),
        }
    }

    /// 创建一个空的内存存储
    pub fn memory() -> Self {
        Self::Memory(MemoryBackend::new())
    }

    fn backend(&self) -> &dyn KvBackend {
        match self {
            Self::Memory(b) => b as &dyn KvBackend,

            #[cfg(feature = "backend-sqlite")]
            Self::Sqlite(b) => b.as_ref() as &dyn KvBackend,
        }
    }

    pub async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> CheckinResult<()> {
        self.backend().put(table, key, value).await
    }

    pub async fn get(&self, table: &str, key: &str) -> CheckinResult<Vec<u8>> {
        self.backend().get(table, key).await
    }

    pub async fn delete(&self, table: &str, key: &str) -> CheckinResult<()> {
        self.backend().delete(table, key).await
    }

    pub async fn list_keys(&self, table: &str) -> CheckinResult<Vec<String>> {
        self.backend().list_keys(table).await
    }

    pub async fn delete_table(&self, table: &str) -> CheckinResult<()> {
        self.backend().delete_table(table).await
    }

    /// 获取后端类型名称
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "Memory",

            #[cfg(feature = "backend-sqlite")]
            Self::Sqlite(_) => "SQLite",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_storage_from_config_memory() {
        let storage = KvStore::from_config(&StorageConfig::default())
            .await
            .unwrap();
        assert_eq!(storage.backend_name(), "Memory");
    }

    #[tokio::test]
    async fn test_storage_from_config_sqlite() {
        let temp_dir = tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Sqlite,
            sqlite_path: temp_dir
                .path()
                .join("nested")
                .to_string_lossy()
                .to_string(),
        };

        let storage = KvStore::from_config(&config).await.unwrap();
        assert_eq!(storage.backend_name(), "SQLite");

        storage.put("t", "k", b"v".to_vec()).await.unwrap();
        assert_eq!(storage.get("t", "k").await.unwrap(), b"v".to_vec());
    }
}
