//! CLI 配置
//!
//! 配置文件与命令行参数的合并，以及分阶段的日志配置

use crate::Cli;
use jsbundle_config::{BundleConfig, ConfigError, LogLevel, Phase};
use jsbundle_vfs::{VfsError, VirtualFileSystem};
use std::path::Path;
use tracing_subscriber::filter::LevelFilter;

/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "jsbundle.json";

/// 读取配置文件（如有），再用命令行参数覆盖
///
/// 显式指定的配置文件不存在时报错；默认的 `jsbundle.json` 缺失则使用默认值。
pub fn load(cli: &Cli, host: &dyn VirtualFileSystem) -> Result<BundleConfig, ConfigError> {
    let (path, explicit) = match &cli.config {
        Some(path) => (path.as_path(), true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };
    let path = host.cwd().join(path);

    let mut config = match host.read_to_string(&path) {
        Ok(text) => BundleConfig::from_json_str(&text, &path.display().to_string())?,
        Err(VfsError::NotFound { .. }) if !explicit => BundleConfig::default(),
        Err(e) => {
            return Err(ConfigError::Unreadable {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        }
    };
    apply_flags(&mut config, cli)?;
    config.validate()?;
    Ok(config)
}

fn apply_flags(config: &mut BundleConfig, cli: &Cli) -> Result<(), ConfigError> {
    if let Some(entry) = &cli.entry {
        config.entry = Some(entry.clone());
    }
    if let Some(level) = cli.source_level {
        config.source_level = level;
    }
    if let Some(folder) = &cli.out_dir {
        config.output.folder = folder.clone();
    }
    if let Some(file) = &cli.out_file {
        config.output.file = Some(file.clone());
    }
    if let Some(target) = cli.target {
        config.target = target;
    }
    if let Some(mode) = cli.source_map {
        config.source_maps = mode;
    }
    for pair in &cli.alias {
        config.add_alias(pair)?;
    }
    for pair in &cli.external {
        config.add_external(pair)?;
    }
    config.watch |= cli.watch;
    config.debug |= cli.debug;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    Ok(())
}

/// CLI 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: LevelFilter,
    pub phases: Vec<(Phase, LevelFilter)>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            global: level_filter(level),
            phases: Vec::new(),
        }
    }

    /// 解析 `phase=level` 形式的分阶段覆盖
    pub fn with_overrides(mut self, pairs: &[String]) -> Result<Self, ConfigError> {
        for pair in pairs {
            let invalid = || ConfigError::InvalidPair {
                kind: String::from("log-phase"),
                pair: pair.clone(),
            };
            let (name, level) = pair.split_once('=').ok_or_else(invalid)?;
            let phase = Phase::ALL
                .into_iter()
                .find(|phase| phase.as_str() == name.trim())
                .ok_or_else(invalid)?;
            let level: LogLevel = level.trim().parse()?;
            self.phases.retain(|(p, _)| *p != phase);
            self.phases.push((phase, level_filter(level)));
        }
        Ok(self)
    }

    /// Get log level for a specific phase
    pub fn level_for(&self, phase: Phase) -> LevelFilter {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, level)| *level)
            .unwrap_or(self.global)
    }
}

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Silent => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}
