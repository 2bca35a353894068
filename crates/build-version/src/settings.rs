//! 递增流程参数解析
//!
//! 命令行/环境变量给出的原始输入优先，未提供时回落到配置文件，最后使用内置默认值。
//! 数值输入必须为正整数，非法值会连同输入名和原始值一起报告。

use std::time::Duration;

use build_version_shared::config::{AppConfig, LockBackend};
use uuid::Uuid;
use version_lock::AcquireOptions;

use crate::error::{BuildVersionError, Result};
use crate::models::RunContext;

/// 未经校验的原始输入（全部为可选字符串）
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub version_table: Option<String>,
    pub version_key: Option<String>,
    pub lock_key: Option<String>,
    pub lock_backend: Option<String>,
    pub lock_table: Option<String>,
    pub lease_duration_seconds: Option<String>,
    pub wait_timeout_seconds: Option<String>,
    pub poll_interval_seconds: Option<String>,
    pub owner: Option<String>,
}

/// 锁定位：锁 key、存储后端和锁表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTarget {
    pub lock_key: String,
    pub backend: LockBackend,
    pub table: String,
}

impl LockTarget {
    /// 显式给出锁 key 时无需版本号 key，否则按 `{version_table}#{version_key}` 推导
    pub fn resolve(raw: &RawInputs, config: &AppConfig) -> Result<Self> {
        let lock_key = match non_empty(&raw.lock_key) {
            Some(key) => key.to_string(),
            None => default_lock_key(version_table(raw, config), version_key(raw, config)?),
        };

        let backend = match non_empty(&raw.lock_backend) {
            Some(value) => value.parse().map_err(|_| BuildVersionError::InvalidInput {
                name: "lock-backend".to_string(),
                value: value.to_string(),
            })?,
            None => config.lock.backend,
        };

        Ok(Self {
            lock_key,
            backend,
            table: non_empty(&raw.lock_table)
                .unwrap_or(config.lock.table.as_str())
                .to_string(),
        })
    }
}

/// 解析后的递增参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementSettings {
    pub version_table: String,
    pub version_key: String,
    pub lock: LockTarget,
    pub lease_duration: Duration,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub owner: String,
    pub acquire_retries: u32,
}

impl IncrementSettings {
    pub fn resolve(
        raw: &RawInputs,
        config: &AppConfig,
        run_context: Option<&RunContext>,
    ) -> Result<Self> {
        let owner = non_empty(&raw.owner)
            .map(str::to_string)
            .unwrap_or_else(|| default_owner(run_context));

        Ok(Self {
            version_table: version_table(raw, config).to_string(),
            version_key: version_key(raw, config)?.to_string(),
            lock: LockTarget::resolve(raw, config)?,
            lease_duration: positive_seconds(
                "lease-duration-seconds",
                &raw.lease_duration_seconds,
                config.lock.lease_duration_seconds,
            )?,
            wait_timeout: positive_seconds(
                "wait-timeout-seconds",
                &raw.wait_timeout_seconds,
                config.lock.wait_timeout_seconds,
            )?,
            poll_interval: positive_seconds(
                "poll-interval-seconds",
                &raw.poll_interval_seconds,
                config.lock.poll_interval_seconds,
            )?,
            owner,
            acquire_retries: config.lock.acquire_retries,
        })
    }

    pub fn acquire_options(&self) -> AcquireOptions {
        AcquireOptions::new(&self.lock.lock_key, &self.owner)
            .lease_duration(self.lease_duration)
            .wait_timeout(self.wait_timeout)
            .poll_interval(self.poll_interval)
    }
}

/// 版本号表名：输入优先，否则取配置
pub fn version_table<'a>(raw: &'a RawInputs, config: &'a AppConfig) -> &'a str {
    non_empty(&raw.version_table).unwrap_or(config.version.table.as_str())
}

/// 版本号 key：输入优先，否则取配置，两者都没有时报错
pub fn version_key<'a>(raw: &'a RawInputs, config: &'a AppConfig) -> Result<&'a str> {
    non_empty(&raw.version_key)
        .or(config.version.key.as_deref().map(str::trim).filter(|k| !k.is_empty()))
        .ok_or_else(|| BuildVersionError::MissingInput("version-key".to_string()))
}

/// 默认锁 key：`{version_table}#{version_key}`
pub fn default_lock_key(version_table: &str, version_key: &str) -> String {
    format!("{}#{}", version_table, version_key)
}

/// 默认持有者：CI 中为 run id，本地运行生成一次性标识
pub fn default_owner(run_context: Option<&RunContext>) -> String {
    match run_context {
        Some(ctx) => ctx.run_id.to_string(),
        None => format!("local-{}", Uuid::new_v4()),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// 解析正整数秒；未提供时使用默认值（默认值同样必须为正）
/// 时间参数上限，与锁记录中 i64 epoch 秒的取值范围一致
const MAX_SECONDS: u64 = i64::MAX as u64;

fn positive_seconds(name: &str, raw: &Option<String>, default: u64) -> Result<Duration> {
    let invalid = |value: String| BuildVersionError::InvalidInput {
        name: name.to_string(),
        value,
    };

    let seconds = match non_empty(raw) {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| invalid(value.to_string()))?,
        None => default,
    };

    if seconds == 0 || seconds > MAX_SECONDS {
        let shown = raw.clone().unwrap_or_else(|| default.to_string());
        return Err(invalid(shown));
    }
    Ok(Duration::from_secs(seconds))
}
