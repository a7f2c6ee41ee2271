//! 键值存储后端抽象接口
//!
//! 定义了所有存储后端必须实现的统一异步接口

use crate::error::CheckinResult;
use async_trait::async_trait;

/// 键值存储后端抽象接口
///
/// 数据按逻辑表（table）分区，每个表内按 key 存储字节值。
/// 后端只需保证单个 key 的原子性，不要求跨 key 事务。
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// 初始化存储后端
    ///
    /// 执行必要的初始化操作，如创建表、索引等
    async fn init(&self) -> CheckinResult<()>;

    /// 整体写入（覆盖）一个值
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> CheckinResult<()>;

    /// 读取一个值
    ///
    /// # Returns
    /// * `Ok(bytes)` - 找到值
    /// * `Err(CheckinError::NotFound)` - 键不存在
    /// * `Err(...)` - 其他存储错误
    async fn get(&self, table: &str, key: &str) -> CheckinResult<Vec<u8>>;

    /// 删除一个值，键不存在时不报错
    async fn delete(&self, table: &str, key: &str) -> CheckinResult<()>;

    /// 列出表中所有 key（无序）
    async fn list_keys(&self, table: &str) -> CheckinResult<Vec<String>>;

    /// 删除整个表
    async fn delete_table(&self, table: &str) -> CheckinResult<()>;
}
