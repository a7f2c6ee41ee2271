//! SQLite 存储后端实现
//!
//! 使用 sqlx 提供原生异步 SQLite 存储支持。所有逻辑表共享一张物理表
//! `kv_entries`，以 `table_name` 列区分。

use crate::error::{CheckinError, CheckinResult};
use crate::kv::backend::KvBackend;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// SQLite 存储后端
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl SqliteBackend {
    /// 创建新的 SQLite 后端实例
    ///
    /// # Arguments
    /// * `db_path` - 数据库文件存储目录路径
    pub async fn new(db_path: &Path) -> CheckinResult<Self> {
        let file = db_path.join("checkin_status.db");

        // 创建连接选项并启用 WAL 模式
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", file.display()))
            .map_err(|e| CheckinError::Config(format!("Failed to parse SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| CheckinError::Io(format!("Failed to connect to SQLite: {e}")))?;

        let backend = Self { pool };
        backend.init().await?;

        info!(
            "SQLite status storage initialized: path={}, WAL mode enabled",
            file.display()
        );

        Ok(backend)
    }
}

#[async_trait]
impl KvBackend for SqliteBackend {
    async fn init(&self) -> CheckinResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                table_name TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (table_name, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CheckinError::Io(format!("Failed to create kv_entries table: {e}")))?;

        debug!("SQLite kv_entries table initialized");
        Ok(())
    }

    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> CheckinResult<()> {
        sqlx::query(
            r#"INSERT INTO kv_entries (table_name, key, value) VALUES (?1, ?2, ?3)
               ON CONFLICT(table_name, key) DO UPDATE SET value = excluded.value"#,
        )
        .bind(table)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| CheckinError::Io(format!("Failed to put {table}/{key}: {e}")))?;
        Ok(())
    }

    async fn get(&self, table: &str, key: &str) -> CheckinResult<Vec<u8>> {
        let row = sqlx::query_as::<_, (Vec<u8>,)>(
            "SELECT value FROM kv_entries WHERE table_name = ? AND key = ?",
        )
        .bind(table)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CheckinError::Io(format!("Failed to get {table}/{key}: {e}")))?;

        match row {
            Some((value,)) => Ok(value),
            None => Err(CheckinError::not_found(table, key)),
        }
    }

    async fn delete(&self, table: &str, key: &str) -> CheckinResult<()> {
        sqlx::query("DELETE FROM kv_entries WHERE table_name = ? AND key = ?")
            .bind(table)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| CheckinError::Io(format!("Failed to delete {table}/{key}: {e}")))?;
        Ok(())
    }

    async fn list_keys(&self, table: &str) -> CheckinResult<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT key FROM kv_entries WHERE table_name = ?",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CheckinError::Io(format!("Failed to list keys of {table}: {e}")))?;

        Ok(rows.into_iter().map(|(key,)| key).collect())
    }

    async fn delete_table(&self, table: &str) -> CheckinResult<()> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE table_name = ?")
            .bind(table)
            .execute(&self.pool)
            .await
            .map_err(|e| CheckinError::Io(format!("Failed to delete table {table}: {e}")))?;

        debug!(
            "Dropped table {} ({} rows)",
            table,
            result.rows_affected()
        );
        Ok(())
    }
}
