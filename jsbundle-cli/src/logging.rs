//! CLI 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现分阶段日志控制。日志写到 stderr，
//! stdout 留给 bundle 输出。

use crate::config::LogConfig;
use jsbundle_config::Phase;
use std::io;
use tracing_subscriber::{filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

/// 构建按阶段过滤的 target 表
pub fn targets(log_config: &LogConfig) -> Targets {
    Phase::ALL
        .into_iter()
        .fold(Targets::new().with_default(log_config.global), |targets, phase| {
            targets.with_target(phase.target(), log_config.level_for(phase))
        })
        .with_target("jsbundle::cli", log_config.global)
}

/// 使用指定格式和日志配置初始化日志系统
pub fn init(log_config: &LogConfig, format: LogFormat) {
    let layer = create_format_layer(format, io::stderr).with_filter(targets(log_config));
    // 重复初始化（例如测试中）时保留已有的 subscriber
    let _ = tracing_subscriber::registry().with(layer).try_init();
}

/// Create formatter layer based on format
fn create_format_layer<W, F>(format: LogFormat, make_writer: F) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsbundle_config::LogLevel;
    use tracing::Level;

    #[test]
    fn test_phase_targets() {
        let config = LogConfig::new(LogLevel::Warn)
            .with_overrides(&["cache=debug".to_string()])
            .unwrap();
        let targets = targets(&config);
        assert!(targets.would_enable("jsbundle::cache", &Level::DEBUG));
        assert!(!targets.would_enable("jsbundle::resolver", &Level::DEBUG));
        assert!(targets.would_enable("jsbundle::resolver", &Level::WARN));
    }

    #[test]
    fn test_silent_disables_everything() {
        let targets = targets(&LogConfig::new(LogLevel::Silent));
        assert!(!targets.would_enable("jsbundle::orchestrator", &Level::ERROR));
    }
}
