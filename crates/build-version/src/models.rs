//! 版本号实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 构建版本号记录
///
/// 每个 `version_key`（通常对应一个应用）一条记录，`version_number` 只增不减。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildVersion {
    pub version_key: String,
    pub version_number: i64,
    pub updated_at: DateTime<Utc>,
    /// 最近一次递增所在的流水线上下文（种子记录为空）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_context: Option<RunContext>,
    /// 最近一次写入所持锁的 generation，用于拒绝过期持有者的写入
    pub lock_generation: i64,
}

impl BuildVersion {
    /// 新建种子记录
    pub fn seed(version_key: impl Into<String>, version_number: i64) -> Self {
        Self {
            version_key: version_key.into(),
            version_number,
            updated_at: Utc::now(),
            run_context: None,
            lock_generation: 0,
        }
    }

    /// 生成递增后的下一条记录
    pub fn next(&self, run_context: Option<RunContext>) -> Self {
        Self {
            version_key: self.version_key.clone(),
            version_number: self.version_number + 1,
            updated_at: Utc::now(),
            run_context,
            lock_generation: self.lock_generation,
        }
    }
}

/// 流水线运行上下文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    /// 触发事件名称（push / workflow_dispatch ...）
    pub event_name: String,
    pub sha: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// 发起流水线的用户
    pub actor: String,
    pub run_number: u64,
    pub run_id: u64,
    pub workflow: String,
    /// 仓库名（不含组织）
    pub repository: String,
    pub organization: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RunContext {
        RunContext {
            event_name: "push".to_string(),
            sha: "abc123".to_string(),
            git_ref: "refs/heads/main".to_string(),
            actor: "octocat".to_string(),
            run_number: 42,
            run_id: 9001,
            workflow: "release".to_string(),
            repository: "mobile".to_string(),
            organization: "acme".to_string(),
        }
    }

    #[test]
    fn test_next_increments_and_stamps_context() {
        let mut current = BuildVersion::seed("mobile", 1500);
        current.lock_generation = 3;

        let next = current.next(Some(context()));
        assert_eq!(next.version_key, "mobile");
        assert_eq!(next.version_number, 1501);
        assert_eq!(next.lock_generation, 3);
        assert_eq!(next.run_context.unwrap().run_id, 9001);
        assert!(next.updated_at >= current.updated_at);
    }

    #[test]
    fn test_run_context_serialization() {
        let json = serde_json::to_value(context()).unwrap();
        assert_eq!(json["eventName"], "push");
        assert_eq!(json["ref"], "refs/heads/main");
        assert_eq!(json["runId"], 9001);

        let parsed: RunContext = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, context());
    }

    #[test]
    fn test_seed_has_no_context() {
        let seed = BuildVersion::seed("mobile", 1);
        let json = serde_json::to_value(&seed).unwrap();
        assert!(json.get("runContext").is_none());
        assert_eq!(json["lockGeneration"], 0);
    }
}
