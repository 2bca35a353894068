//! 条件存储适配层
//!
//! 对键值后端暴露三个原子原语：条件写入、一致性读取、条件删除。
//! 锁的正确性完全依赖后端把“条件求值 + 写入”作为单个原子操作执行。
//!
//! 两个条件是固定的：写入只在记录不存在或已过期时成立（与持有者无关），
//! 删除只在记录由指定持有者持有时成立。有效期内的记录不能被原地改写。
//!
//! ## 后端
//!
//! - `MemoryConditionalStore`: 进程内 DashMap，用于测试和单机演练
//! - `PostgresConditionalStore`: `INSERT ... ON CONFLICT DO UPDATE ... WHERE`
//! - `RedisConditionalStore`: Lua 脚本在服务端原子执行

mod memory;
mod postgres;
mod redis_store;

pub use memory::MemoryConditionalStore;
pub use postgres::PostgresConditionalStore;
pub use redis_store::RedisConditionalStore;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{LeaseWrite, LockRecord};

/// 条件存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConditionalStore: Send + Sync {
    /// 后端名称，用于日志
    fn backend(&self) -> &'static str;

    /// 条件写入
    ///
    /// 记录不存在或其 `expires_at` 严格早于 `now` 时写入 `write` 并分配新的
    /// generation，返回写入后的记录；否则返回 `StoreError::PreconditionFailed`。
    async fn conditional_put(
        &self,
        key: &str,
        write: LeaseWrite,
        now: i64,
    ) -> StoreResult<LockRecord>;

    /// 一致性读取（必须读到最近一次已提交的值）
    async fn get(&self, key: &str) -> StoreResult<Option<LockRecord>>;

    /// 条件删除
    ///
    /// 仅当记录存在且由 `holder` 持有时删除；记录不存在或持有者不同返回
    /// `StoreError::PreconditionFailed`。
    async fn conditional_delete(&self, key: &str, holder: &str) -> StoreResult<()>;
}
