//! Redis 条件存储
//!
//! 记录保存为 hash（holder / expires_at / generation），key 为 `{namespace}:{lock_key}`。
//! 条件写入与删除都通过 Lua 脚本在服务端原子执行，避免检查-写入之间的竞态。
//! generation 由同级计数器 `{namespace}:{lock_key}:generation` 的 INCR 产生。

use std::collections::HashMap;

use async_trait::async_trait;
use build_version_shared::redis_client::RedisConnector;
use redis::{AsyncCommands, Script};
use tracing::instrument;

use super::ConditionalStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{LeaseWrite, LockRecord};

/// 记录不存在或已过期（expires_at < ARGV[1]）时写入并返回新的 generation，否则返回 nil
const PUT_SCRIPT: &str = r#"
local expires_at = tonumber(redis.call('HGET', KEYS[1], 'expires_at'))
if expires_at and expires_at >= tonumber(ARGV[1]) then
    return false
end
local generation = redis.call('INCR', KEYS[2])
redis.call('HSET', KEYS[1], 'holder', ARGV[2], 'expires_at', ARGV[3], 'generation', generation)
return generation
"#;

/// 记录由 ARGV[1] 持有时删除并返回 1，否则返回 0
const DELETE_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[1], 'holder') == ARGV[1] then
    redis.call('DEL', KEYS[1])
    return 1
end
return 0
"#;

/// Redis 条件存储
#[derive(Clone)]
pub struct RedisConditionalStore {
    connector: RedisConnector,
    namespace: String,
    put_script: Script,
    delete_script: Script,
}

impl RedisConditionalStore {
    pub fn new(connector: RedisConnector, namespace: impl Into<String>) -> Self {
        Self {
            connector,
            namespace: namespace.into(),
            put_script: Script::new(PUT_SCRIPT),
            delete_script: Script::new(DELETE_SCRIPT),
        }
    }

    fn record_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn generation_key(&self, key: &str) -> String {
        format!("{}:{}:generation", self.namespace, key)
    }
}

fn parse_record(key: &str, fields: &HashMap<String, String>) -> StoreResult<LockRecord> {
    let field = |name: &str| {
        fields.get(name).ok_or_else(|| StoreError::Malformed {
            key: key.to_string(),
            reason: format!("missing field '{}'", name),
        })
    };
    let number = |name: &str| -> StoreResult<i64> {
        field(name)?.parse().map_err(|_| StoreError::Malformed {
            key: key.to_string(),
            reason: format!("field '{}' is not an integer", name),
        })
    };

    Ok(LockRecord {
        key: key.to_string(),
        holder: field("holder")?.clone(),
        expires_at: number("expires_at")?,
        generation: number("generation")?,
    })
}

#[async_trait]
impl ConditionalStore for RedisConditionalStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self, write), fields(namespace = %self.namespace))]
    async fn conditional_put(
        &self,
        key: &str,
        write: LeaseWrite,
        now: i64,
    ) -> StoreResult<LockRecord> {
        let mut conn = self.connector.connection().await?;

        let generation: Option<i64> = self
            .put_script
            .key(self.record_key(key))
            .key(self.generation_key(key))
            .arg(now)
            .arg(&write.holder)
            .arg(write.expires_at)
            .invoke_async(&mut conn)
            .await?;

        match generation {
            Some(generation) => Ok(LockRecord {
                key: key.to_string(),
                holder: write.holder,
                expires_at: write.expires_at,
                generation,
            }),
            None => Err(StoreError::precondition_failed(key)),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<LockRecord>> {
        let mut conn = self.connector.connection().await?;
        let fields: HashMap<String, String> = conn.hgetall(self.record_key(key)).await?;

        if fields.is_empty() {
            return Ok(None);
        }
        parse_record(key, &fields).map(Some)
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn conditional_delete(&self, key: &str, holder: &str) -> StoreResult<()> {
        let mut conn = self.connector.connection().await?;

        let deleted: i64 = self
            .delete_script
            .key(self.record_key(key))
            .arg(holder)
            .invoke_async(&mut conn)
            .await?;

        if deleted == 0 {
            return Err(StoreError::precondition_failed(key));
        }
        Ok(())
    }
}
