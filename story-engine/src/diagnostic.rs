//! # 诊断模块
//!
//! 标签的静态检查，不依赖 IO 或会话。
//!
//! 运行时对异常标签一律容错（降级为默认值或转交观察者），
//! 这里把同样的异常提前报告给内容作者。
//!
//! - Error：数值格式错误，运行时会静默回退
//! - Warn：键或值不在引擎词汇表中
//! - Info：未知的裸标记（会转交观察者，可能是有意为之）

use std::fmt;
use std::str::FromStr;

use crate::clock::StoryClock;
use crate::frame::StoryFrame;
use crate::interpreter::{KNOWN_FLAGS, KNOWN_KEYS, KNOWN_TYPES};
use crate::presentation::{ImageLayout, Mood};
use crate::tag::Tag;

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    /// 信息提示
    Info,
    /// 警告（建议修复）
    Warn,
    /// 错误（必须修复）
    Error,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// 诊断条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// 故事文件 ID / 路径
    pub source: String,
    /// 在文件中的位置（如 `nodes.interview.paragraphs[2]`）
    pub location: Option<String>,
    pub message: String,
    /// 原始标签
    pub detail: Option<String>,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, source: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            source: source.to_string(),
            location: None,
            message: message.into(),
            detail: None,
        }
    }

    pub fn error(source: &str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, source, message)
    }

    pub fn warn(source: &str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warn, source, message)
    }

    pub fn info(source: &str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, source, message)
    }

    /// 设置位置
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// 设置详情
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.source)?;
        if let Some(location) = &self.location {
            write!(f, " @ {}", location)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n  | {}", detail)?;
        }
        Ok(())
    }
}

/// 诊断结果
#[derive(Debug, Clone, Default)]
pub struct DiagnosticResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// 合并另一个结果
    pub fn merge(&mut self, other: DiagnosticResult) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn error_count(&self) -> usize {
        self.count(DiagnosticLevel::Error)
    }

    pub fn warn_count(&self) -> usize {
        self.count(DiagnosticLevel::Warn)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 按最低级别过滤
    pub fn filter_by_level(&self, min_level: DiagnosticLevel) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.level >= min_level).collect()
    }

    fn count(&self, level: DiagnosticLevel) -> usize {
        self.diagnostics.iter().filter(|d| d.level == level).count()
    }
}

/// 检查一组标签
pub fn lint_tags(source: &str, location: &str, tags: &[Tag]) -> DiagnosticResult {
    let mut result = DiagnosticResult::new();
    for tag in tags {
        if let Some(diag) = lint_one(source, tag) {
            result.push(diag.at(location).with_detail(tag.to_string()));
        }
    }
    result
}

/// 检查一帧中所有段落、选项和故事级标签
pub fn lint_frame(source: &str, frame: &StoryFrame) -> DiagnosticResult {
    let mut result = lint_tags(source, "global_tags", &frame.global_tags);
    for (i, paragraph) in frame.paragraphs.iter().enumerate() {
        result.merge(lint_tags(source, &format!("paragraphs[{i}]"), &paragraph.tags));
    }
    for choice in &frame.choices {
        result.merge(lint_choice_tags(
            source,
            &format!("choices[{}]", choice.index),
            &choice.tags,
        ));
    }
    result
}

/// 检查选项标签
///
/// 选项上只有 `interrogation` 与 `tactic:<x>` 有意义，其余标签会被忽略。
pub fn lint_choice_tags(source: &str, location: &str, tags: &[Tag]) -> DiagnosticResult {
    let mut result = DiagnosticResult::new();
    for tag in tags {
        let diag = match tag {
            Tag::Flag(name) if name == "interrogation" => continue,
            Tag::Pair { key, value } if key == "tactic" => {
                if !value.is_empty() {
                    continue;
                }
                Diagnostic::warn(source, "tactic 的值为空")
            }
            _ => Diagnostic::info(source, format!("选项标签 **{}** 不会被使用", tag.key())),
        };
        result.push(diag.at(location).with_detail(tag.to_string()));
    }
    result
}

fn lint_one(source: &str, tag: &Tag) -> Option<Diagnostic> {
    let (key, value) = match tag {
        Tag::Flag(name) => {
            if KNOWN_FLAGS.contains(&name.as_str()) {
                return None;
            }
            return Some(Diagnostic::info(source, format!("未知标记 **{name}**，将转交观察者")));
        }
        Tag::Pair { key, value } => (key.as_str(), value.as_str()),
    };

    if !KNOWN_KEYS.contains(&key) {
        return Some(Diagnostic::warn(source, format!("未知标签键 **{key}**")));
    }

    match key {
        "mood" if Mood::from_str(value).is_err() => {
            Some(Diagnostic::warn(source, format!("未知情绪 **{value}**，情绪将保持不变")))
        }
        "chapter" if !matches!(value.parse::<u32>(), Ok(n) if n >= 1) => {
            Some(Diagnostic::error(source, "章节号必须是 >= 1 的整数"))
        }
        "timer" if value.parse::<u32>().is_err() => {
            Some(Diagnostic::error(source, "timer 必须是秒数，将回退为 300"))
        }
        "pressure" if value.parse::<i32>().is_err() => {
            Some(Diagnostic::error(source, "pressure 必须是 N、+N 或 -N"))
        }
        "time" if StoryClock::parse(value).is_none() => {
            Some(Diagnostic::error(source, "time 必须是 HH:MM 格式"))
        }
        "image_position" if ImageLayout::from_str(value).is_err() => Some(Diagnostic::warn(
            source,
            "image_position 只能是 top / background / inline",
        )),
        "type" if !KNOWN_TYPES.contains(&value) => {
            Some(Diagnostic::warn(source, format!("未知段落类型 **{value}**")))
        }
        "mode" if value != "interrogation" && value != "normal" => {
            Some(Diagnostic::warn(source, format!("未知模式 **{value}**")))
        }
        "image" | "sfx" | "music" | "speaker" | "suspect" if value.is_empty() => {
            Some(Diagnostic::warn(source, format!("{key} 的值为空")))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Choice, Paragraph};

    fn lint(tags: &[&str]) -> DiagnosticResult {
        lint_tags("case.json", "paragraphs[0]", &Tag::parse_all(tags))
    }

    #[test]
    fn test_clean_tags() {
        let result = lint(&[
            "mood:horror",
            "chapter:2",
            "timer:120",
            "pressure:+15",
            "time:22:40",
            "image_position:inline",
            "type:document",
            "mode:interrogation",
            "clue",
        ]);
        assert!(result.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn test_malformed_numbers_are_errors() {
        let result = lint(&["chapter:two", "chapter:0", "timer:soon", "pressure:lots", "time:25:00"]);
        assert_eq!(result.error_count(), 5);
        assert!(result.has_errors());
    }

    #[test]
    fn test_unknown_vocabulary() {
        let result = lint(&["weather:rain", "mood:jolly", "type:hologram", "secret"]);
        assert_eq!(result.warn_count(), 3);
        assert_eq!(result.filter_by_level(DiagnosticLevel::Info).len(), 4);
        assert_eq!(result.filter_by_level(DiagnosticLevel::Warn).len(), 3);
    }

    #[test]
    fn test_diagnostic_display() {
        let result = lint(&["chapter:two"]);
        let display = result.diagnostics[0].to_string();
        assert!(display.contains("[ERROR]"));
        assert!(display.contains("case.json @ paragraphs[0]"));
        assert!(display.contains("| chapter:two"));
    }

    #[test]
    fn test_lint_frame_locations() {
        let frame = StoryFrame {
            paragraphs: vec![
                Paragraph::with_tags("a", ["mood:tense"]),
                Paragraph::with_tags("b", ["mood:glum"]),
            ],
            choices: vec![
                Choice::new(0, "Давить").tagged(["tactic:press"]),
                Choice::new(1, "Уйти").tagged(["mood:calm"]),
            ],
            global_tags: Tag::parse_all(["author:someone"]),
            ..Default::default()
        };
        let result = lint_frame("case.json", &frame);
        let locations: Vec<_> = result
            .diagnostics
            .iter()
            .map(|d| d.location.as_deref().unwrap_or(""))
            .collect();
        assert_eq!(locations, vec!["global_tags", "paragraphs[1]", "choices[1]"]);
    }
}
