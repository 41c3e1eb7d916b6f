//! # Config 模块
//!
//! 引擎配置。
//!
//! 节奏常量（揭示延迟）、幻视时长、审讯默认时限属于行为契约，
//! 固定在各自模块里，**不**在这里配置。

use serde::{Deserialize, Serialize};

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 场景图根目录（`image:<name>` 解析为 `<image_root>/<name>`）
    #[serde(default = "default_image_root")]
    pub image_root: String,

    /// 场景图缺省扩展名（`name` 不带扩展名时追加）
    #[serde(default = "default_image_extension")]
    pub image_extension: String,

    /// 故事时钟起始时间（当日分钟数，默认 22:00）
    #[serde(default = "default_clock_start_minutes")]
    pub clock_start_minutes: u32,

    /// 每条对话推进的故事时钟分钟数
    #[serde(default = "default_clock_step_minutes")]
    pub clock_step_minutes: u32,

    /// 是否启用基于文本内容的旧式分类（如按正则识别日期行）
    ///
    /// 默认关闭；新内容应使用显式的 `type:<variant>` 标签。
    #[serde(default)]
    pub legacy_text_heuristics: bool,

    /// 回看记录上限
    #[serde(default = "default_backlog_capacity")]
    pub backlog_capacity: usize,
}

// 默认值函数
fn default_image_root() -> String {
    "images".to_string()
}

fn default_image_extension() -> String {
    "jpg".to_string()
}

fn default_clock_start_minutes() -> u32 {
    22 * 60
}

fn default_clock_step_minutes() -> u32 {
    1
}

fn default_backlog_capacity() -> usize {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            image_root: default_image_root(),
            image_extension: default_image_extension(),
            clock_start_minutes: default_clock_start_minutes(),
            clock_step_minutes: default_clock_step_minutes(),
            legacy_text_heuristics: false,
            backlog_capacity: default_backlog_capacity(),
        }
    }
}

impl EngineConfig {
    /// 把 `image:<name>` 的值解析为资源路径
    pub fn resolve_image(&self, name: &str) -> String {
        let name = name.trim_start_matches('/');
        let has_extension = name
            .rsplit('/')
            .next()
            .is_some_and(|file| file.contains('.'));

        let file = if has_extension || self.image_extension.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, self.image_extension)
        };

        if self.image_root.is_empty() {
            file
        } else {
            format!("{}/{}", self.image_root.trim_end_matches('/'), file)
        }
    }
}
