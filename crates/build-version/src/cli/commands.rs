//! CLI 命令定义
//!
//! 使用 clap derive 宏定义命令行接口结构。
//! 每个参数都可以通过同名环境变量提供，便于在流水线中以步骤输入的方式注入。

use clap::{Args, Parser, Subcommand};

use crate::settings::RawInputs;

/// 构建版本号工具
///
/// 在基于租约的分布式锁保护下递增共享的构建版本号。
#[derive(Parser, Debug)]
#[command(name = "build-version")]
#[command(version, about = "在分布式锁保护下递增构建版本号")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令枚举
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 递增版本号
    ///
    /// 获取锁后读取当前版本号并加一，结果写入 `$GITHUB_OUTPUT` 的 `build-version`。
    Increment(IncrementArgs),

    /// 初始化版本号记录（已存在时不做修改）
    Seed(SeedArgs),

    /// 查看当前锁记录
    LockStatus(LockArgs),
}

/// 版本号定位参数
#[derive(Args, Debug, Clone, Default)]
pub struct VersionArgs {
    /// 版本号表名
    #[arg(long, env = "BUILD_VERSION_TABLE")]
    pub version_table: Option<String>,

    /// 版本号 key
    #[arg(long, env = "BUILD_VERSION_KEY")]
    pub version_key: Option<String>,
}

/// 初始化参数
#[derive(Args, Debug, Clone, Default)]
pub struct SeedArgs {
    #[command(flatten)]
    pub version: VersionArgs,

    /// 起始版本号
    #[arg(long, default_value = "0")]
    pub start: i64,
}

/// 锁定位参数
#[derive(Args, Debug, Clone, Default)]
pub struct LockArgs {
    #[command(flatten)]
    pub version: VersionArgs,

    /// 锁 key，默认 `{version_table}#{version_key}`
    #[arg(long, env = "BUILD_VERSION_LOCK_KEY")]
    pub lock_key: Option<String>,

    /// 锁存储后端 (postgres, redis)
    #[arg(long, env = "BUILD_VERSION_LOCK_BACKEND")]
    pub lock_backend: Option<String>,

    /// 锁表名（Redis 后端作为 key 前缀）
    #[arg(long, env = "BUILD_VERSION_LOCK_TABLE")]
    pub lock_table: Option<String>,
}

/// 递增参数
#[derive(Args, Debug, Clone, Default)]
pub struct IncrementArgs {
    #[command(flatten)]
    pub lock: LockArgs,

    /// 租约时长（秒）
    #[arg(long, env = "BUILD_VERSION_LOCK_LEASE_DURATION_SECONDS")]
    pub lease_duration_seconds: Option<String>,

    /// 获取锁的最长等待时间（秒）
    #[arg(long, env = "BUILD_VERSION_LOCK_WAIT_TIMEOUT_SECONDS")]
    pub wait_timeout_seconds: Option<String>,

    /// 轮询间隔（秒）
    #[arg(long, env = "BUILD_VERSION_LOCK_POLL_INTERVAL_SECONDS")]
    pub poll_interval_seconds: Option<String>,

    /// 锁持有者标识，默认 `GITHUB_RUN_ID`
    #[arg(long, env = "BUILD_VERSION_LOCK_OWNER")]
    pub owner: Option<String>,
}

impl From<VersionArgs> for RawInputs {
    fn from(args: VersionArgs) -> Self {
        Self {
            version_table: args.version_table,
            version_key: args.version_key,
            ..Default::default()
        }
    }
}

impl From<LockArgs> for RawInputs {
    fn from(args: LockArgs) -> Self {
        Self {
            lock_key: args.lock_key,
            lock_backend: args.lock_backend,
            lock_table: args.lock_table,
            ..args.version.into()
        }
    }
}

impl From<IncrementArgs> for RawInputs {
    fn from(args: IncrementArgs) -> Self {
        Self {
            lease_duration_seconds: args.lease_duration_seconds,
            wait_timeout_seconds: args.wait_timeout_seconds,
            poll_interval_seconds: args.poll_interval_seconds,
            owner: args.owner,
            ..args.lock.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_increment() {
        let cli = Cli::try_parse_from([
            "build-version",
            "increment",
            "--version-key",
            "mobile",
            "--lock-backend",
            "redis",
            "--wait-timeout-seconds",
            "30",
        ])
        .unwrap();

        let Commands::Increment(args) = cli.command else {
            panic!("expected increment");
        };
        let raw = RawInputs::from(args);
        assert_eq!(raw.version_key.as_deref(), Some("mobile"));
        assert_eq!(raw.lock_backend.as_deref(), Some("redis"));
        assert_eq!(raw.wait_timeout_seconds.as_deref(), Some("30"));
    }

    #[test]
    fn test_parse_seed() {
        let cli = Cli::try_parse_from([
            "build-version",
            "seed",
            "--version-table",
            "versions",
            "--version-key",
            "mobile",
            "--start",
            "1500",
        ])
        .unwrap();

        let Commands::Seed(args) = cli.command else {
            panic!("expected seed");
        };
        assert_eq!(args.start, 1500);
        let raw = RawInputs::from(args.version);
        assert_eq!(raw.version_table.as_deref(), Some("versions"));
        assert_eq!(raw.version_key.as_deref(), Some("mobile"));
        assert_eq!(raw.lock_key, None);
    }

    #[test]
    fn test_parse_lock_status() {
        let cli = Cli::try_parse_from([
            "build-version",
            "lock-status",
            "--version-key",
            "mobile",
            "--lock-key",
            "k",
        ])
        .unwrap();

        let Commands::LockStatus(args) = cli.command else {
            panic!("expected lock-status");
        };
        let raw = RawInputs::from(args);
        assert_eq!(raw.version_key.as_deref(), Some("mobile"));
        assert_eq!(raw.lock_key.as_deref(), Some("k"));
    }
}
