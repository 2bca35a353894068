//! 内存条件存储
//!
//! 使用 DashMap 的 entry API 持有分片锁完成“求值 + 写入”，保证单进程内的原子性。
//! generation 计数器单独保存，记录删除后不会回退。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::ConditionalStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{LeaseWrite, LockRecord};

/// 内存条件存储
///
/// Clone 共享同一份数据，可模拟多个进程访问同一个存储。
#[derive(Debug, Clone, Default)]
pub struct MemoryConditionalStore {
    records: Arc<DashMap<String, LockRecord>>,
    generations: Arc<DashMap<String, i64>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryConditionalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入一条记录（绕过条件），用于构造测试场景
    pub fn insert_record(&self, record: LockRecord) {
        self.generations
            .entry(record.key.clone())
            .and_modify(|g| *g = (*g).max(record.generation))
            .or_insert(record.generation);
        self.records.insert(record.key.clone(), record);
    }

    /// 切换故障模式：开启后所有操作返回 `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 当前记录数
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                backend: "memory",
                message: "store marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn next_generation(&self, key: &str) -> i64 {
        let mut generation = self.generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }
}

#[async_trait]
impl ConditionalStore for MemoryConditionalStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn conditional_put(
        &self,
        key: &str,
        write: LeaseWrite,
        now: i64,
    ) -> StoreResult<LockRecord> {
        self.ensure_available()?;

        let entry = self.records.entry(key.to_string());
        if matches!(&entry, Entry::Occupied(occupied) if !occupied.get().is_reclaimable_at(now)) {
            return Err(StoreError::precondition_failed(key));
        }

        let record = LockRecord {
            key: key.to_string(),
            holder: write.holder,
            expires_at: write.expires_at,
            generation: self.next_generation(key),
        };
        entry.insert(record.clone());
        Ok(record)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<LockRecord>> {
        self.ensure_available()?;
        Ok(self.records.get(key).map(|r| r.clone()))
    }

    async fn conditional_delete(&self, key: &str, holder: &str) -> StoreResult<()> {
        self.ensure_available()?;

        match self.records.entry(key.to_string()) {
            Entry::Occupied(occupied) if occupied.get().is_held_by(holder) => {
                occupied.remove();
                Ok(())
            }
            _ => Err(StoreError::precondition_failed(key)),
        }
    }
}
