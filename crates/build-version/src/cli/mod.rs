//! CLI 模块
//!
//! 提供命令行接口，支持以下功能：
//!
//! - `increment` - 在分布式锁保护下将版本号加一
//! - `seed` - 初始化版本号记录
//! - `lock-status` - 查看当前锁记录
//!
//! # 使用示例
//!
//! ```bash
//! # 递增版本号（CI 中 owner 默认为 GITHUB_RUN_ID）
//! build-version increment --version-key mobile --lock-backend postgres
//!
//! # 初始化版本号
//! build-version seed --version-key mobile --start 1500
//!
//! # 查看锁状态
//! build-version lock-status --version-key mobile
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands, IncrementArgs, LockArgs, SeedArgs, VersionArgs};
pub use runner::CommandRunner;
