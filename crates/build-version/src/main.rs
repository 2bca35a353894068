//! build-version 命令行入口
//!
//! 加载配置、初始化日志后执行子命令。任何失败都以非零状态退出并输出错误信息。

use std::process::ExitCode;

use build_version::cli::{Cli, CommandRunner, Commands};
use build_version_shared::{config::AppConfig, observability};
use clap::Parser;
use tracing::error;

const SERVICE_NAME: &str = "build-version";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // 1. 加载配置：config/default.toml -> config/{env}.toml -> BUILD_VERSION_* 环境变量
    let config = AppConfig::load(SERVICE_NAME)?;

    // 2. 初始化日志
    observability::init(&config.service_name, &config.observability)?;

    let runner = CommandRunner::new(config);
    let result = match cli.command {
        Commands::Increment(args) => runner.run_increment(args.into()).await.map(|_| ()),
        Commands::Seed(args) => runner.run_seed(args.version.into(), args.start).await,
        Commands::LockStatus(args) => runner.run_lock_status(args.into()).await,
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!(code = e.error_code(), error = %e, "Command failed");
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
