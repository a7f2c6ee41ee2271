//! 存储后端配置
//!
//! 定义状态存储后端的配置结构

use serde::{Deserialize, Serialize};

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 存储后端类型
    pub backend: StorageBackend,

    /// SQLite 数据库文件存储目录（当 backend = "sqlite" 时使用）
    ///
    /// 数据库文件为 `{sqlite_path}/checkin_status.db`
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            sqlite_path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> String {
    "database".to_string()
}

/// 存储后端类型枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 进程内存（重启丢失）
    Memory,
    /// SQLite 数据库
    Sqlite,
}
