//! # Config 模块
//!
//! 宿主配置。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高）
//! 2. 配置文件 (story-cli.json)
//! 3. 默认值（最低）

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use story_engine::EngineConfig;
use thiserror::Error;
use tracing::{info, warn};

/// 宿主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// 故事文件（JSON 节点图）
    #[serde(default = "default_story_path")]
    pub story_path: PathBuf,

    /// 存档目录
    #[serde(default = "default_saves_dir")]
    pub saves_dir: PathBuf,

    /// 自动存档使用的键
    #[serde(default = "default_save_key")]
    pub save_key: String,

    /// 日志级别（error / warn / info / debug / trace）
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// 播放速度倍率（2.0 表示两倍速）
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// 引擎配置
    #[serde(default)]
    pub engine: EngineConfig,
}

// 默认值函数
fn default_story_path() -> PathBuf {
    PathBuf::from("host-cli/stories/demo.json")
}

fn default_saves_dir() -> PathBuf {
    PathBuf::from("saves")
}

fn default_save_key() -> String {
    "autosave".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_speed() -> f64 {
    1.0
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            story_path: default_story_path(),
            saves_dir: default_saves_dir(),
            save_key: default_save_key(),
            log_level: default_log_level(),
            speed: default_speed(),
            engine: EngineConfig::default(),
        }
    }
}

/// 最大播放速度倍率
pub const MAX_SPEED: f64 = 100.0;

impl HostConfig {
    /// 加载配置文件
    ///
    /// 文件不存在或解析失败时返回默认配置，同时返回配置来源。
    /// 加载时日志订阅器可能尚未安装，来源由调用方在安装之后通过 [`ConfigSource::report`] 记录。
    pub fn load(path: impl AsRef<Path>) -> (Self, ConfigSource) {
        let path = path.as_ref();

        if !path.exists() {
            return (Self::default(), ConfigSource::Missing);
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => (config, ConfigSource::File),
                Err(e) => (
                    Self::default(),
                    ConfigSource::Fallback(format!("配置文件解析失败: {e}")),
                ),
            },
            Err(e) => (
                Self::default(),
                ConfigSource::Fallback(format!("配置文件读取失败: {e}")),
            ),
        }
    }

    /// 保存配置到文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializationFailed(e.to_string()))?;
        fs::write(path, json).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.story_path.exists() {
            return Err(ConfigError::ValidationFailed(format!(
                "故事文件不存在: {}",
                self.story_path.display()
            )));
        }

        if !(self.speed > 0.0 && self.speed <= MAX_SPEED) {
            return Err(ConfigError::ValidationFailed(format!(
                "播放速度必须在 (0, {MAX_SPEED}] 之间"
            )));
        }

        if self.save_key.is_empty()
            || !self
                .save_key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::ValidationFailed(
                "存档键只能包含字母、数字、'_' 和 '-'".to_string(),
            ));
        }

        if parse_level(&self.log_level).is_none() {
            return Err(ConfigError::ValidationFailed(format!(
                "未知日志级别: {}",
                self.log_level
            )));
        }

        if self.engine.backlog_capacity == 0 {
            return Err(ConfigError::ValidationFailed("回看记录上限必须大于 0".to_string()));
        }

        Ok(())
    }

    /// 日志级别
    pub fn level(&self) -> tracing::Level {
        parse_level(&self.log_level).unwrap_or(tracing::Level::INFO)
    }
}

fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.to_ascii_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

/// 配置来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// 从配置文件加载
    File,
    /// 文件不存在，使用默认配置
    Missing,
    /// 文件无法使用，回退到默认配置
    Fallback(String),
}

impl ConfigSource {
    /// 记录配置来源
    pub fn report(&self, path: &Path) {
        match self {
            Self::File => info!(path = %path.display(), "配置文件加载成功"),
            Self::Missing => info!(path = %path.display(), "配置文件不存在，使用默认配置"),
            Self::Fallback(reason) => {
                warn!(path = %path.display(), reason = %reason, "使用默认配置")
            }
        }
    }
}

/// 配置错误
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("配置序列化失败: {0}")]
    SerializationFailed(String),
    #[error("配置 IO 错误: {0}")]
    IoError(String),
    #[error("配置验证失败: {0}")]
    ValidationFailed(String),
}
