//! 日志初始化模块
//!
//! 所有二进制入口通过单一入口点配置 tracing，确保一致的日志格式。
//! CI 环境通常使用 json 格式以便日志平台解析，本地调试使用 pretty 格式。

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::ObservabilityConfig;

/// 构建环境过滤器
///
/// `RUST_LOG` 优先，其次是配置中的日志级别，两者都无效时回退到 info。
pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化 tracing
///
/// 日志写到标准错误，标准输出只留给命令结果。
/// 重复初始化会返回错误（全局 subscriber 只能设置一次）。
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<()> {
    let fmt_layer = if config.json_logs() {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt_layer)
        .try_init()?;

    info!(
        service = %service_name,
        log_level = %config.log_level,
        log_format = %config.log_format,
        "Logging initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back() {
        let config = ObservabilityConfig {
            log_level: "not a [valid directive".to_string(),
            log_format: "pretty".to_string(),
        };
        // 无论 RUST_LOG 是否设置，构建过滤器都不应 panic
        let _ = env_filter(&config);
    }

    #[test]
    fn test_init_twice_fails() {
        let config = ObservabilityConfig::default();
        let first = init("test-service", &config);
        let second = init("test-service", &config);
        // 同一进程内最多只有一次初始化成功
        assert!(first.is_err() || second.is_err());
    }
}
