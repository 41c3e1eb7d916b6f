//! # Classify 模块
//!
//! 段落 → 渲染变体的纯函数分类。
//!
//! 规则按优先级排列，第一条命中的规则决定结果：
//!
//! 1. 显式 `type:<variant>` 标签
//! 2. `speaker:<id>` 标签 → 对话
//! 3. （仅在 `legacy_text_heuristics` 开启时）按文本内容识别日期行
//! 4. 兜底：旁白
//!
//! 第 3 条是旧内容的兼容手段，新内容应当显式打 `type:date`。

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use regex::Regex;

use crate::tag::{self, Tag};

/// 渲染变体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderVariant {
    /// 角色对话
    Dialogue { speaker: String },
    /// 幻视
    Vision,
    /// 文件 / 档案
    Document,
    /// 系统提示
    SystemNote,
    /// 日期行
    DateLine,
    /// 旁白
    Narration,
}

/// 匹配整行日期：`14.03.1987`、`14/03/87`、`14 марта 1987`、`14 марта 1987 г.`
static LEGACY_DATE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2}[./]\d{1,2}[./]\d{2,4}|\d{1,2}\s+\p{L}+\s+\d{4}(\s*(г\.?|года))?)\s*$")
        .expect("invalid LEGACY_DATE_LINE regex")
});

type Rule = fn(&str, &[Tag], bool) -> Option<RenderVariant>;

const RULES: &[Rule] = &[explicit_type, speaker, legacy_date_line];

/// 对段落分类
pub fn classify(text: &str, tags: &[Tag], legacy_text_heuristics: bool) -> RenderVariant {
    RULES
        .iter()
        .find_map(|rule| rule(text, tags, legacy_text_heuristics))
        .unwrap_or(RenderVariant::Narration)
}

fn explicit_type(_text: &str, tags: &[Tag], _legacy: bool) -> Option<RenderVariant> {
    match tag::value_of(tags, "type")? {
        "vision" => Some(RenderVariant::Vision),
        "document" => Some(RenderVariant::Document),
        "system" => Some(RenderVariant::SystemNote),
        "date" => Some(RenderVariant::DateLine),
        "narration" => Some(RenderVariant::Narration),
        // 未知类型交给后续规则
        _ => None,
    }
}

fn speaker(_text: &str, tags: &[Tag], _legacy: bool) -> Option<RenderVariant> {
    tag::value_of(tags, "speaker")
        .filter(|s| !s.is_empty())
        .map(|s| RenderVariant::Dialogue {
            speaker: s.to_string(),
        })
}

fn legacy_date_line(text: &str, _tags: &[Tag], legacy: bool) -> Option<RenderVariant> {
    (legacy && LEGACY_DATE_LINE.is_match(text)).then_some(RenderVariant::DateLine)
}
