//! # Frame 模块
//!
//! 外部故事运行时每次推进产出的数据单元。
//!
//! ## 不变量
//!
//! - `paragraphs` 的顺序就是揭示顺序
//! - 标签只属于一个段落，不会跨段泄漏
//! - `variables` 每帧都是完整快照，而不是增量

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::tag::{self, Tag};

/// 故事变量值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    /// 布尔值
    Bool(bool),
    /// 整数
    Int(i64),
    /// 浮点数
    Float(f64),
    /// 字符串
    String(String),
}

/// 段落
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// 展示文本（不含标签）
    pub text: String,
    /// 该段落的标签
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Paragraph {
    /// 创建无标签段落
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tags: Vec::new(),
        }
    }

    /// 创建带标签的段落
    pub fn with_tags<I, S>(text: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            text: text.into(),
            tags: Tag::parse_all(tags),
        }
    }

    /// 说话者（`speaker:<id>` 标签）
    pub fn speaker(&self) -> Option<&str> {
        tag::value_of(&self.tags, "speaker")
    }

    /// 展示文本的字符数
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// 选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// 交回运行时的选项索引
    pub index: usize,
    /// 选项文本
    pub text: String,
    /// 选项标签
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Choice {
    /// 创建选项
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            tags: Vec::new(),
        }
    }

    /// 附加标签
    pub fn tagged<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = Tag::parse_all(tags);
        self
    }

    /// 是否为审讯选项（`interrogation` 标记或 `tactic:<x>`）
    pub fn is_interrogation(&self) -> bool {
        tag::has_flag(&self.tags, "interrogation") || tag::value_of(&self.tags, "tactic").is_some()
    }
}

/// 故事帧
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryFrame {
    /// 按揭示顺序排列的段落
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    /// 可用选项（故事结束时为空）
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// 变量快照
    #[serde(default)]
    pub variables: BTreeMap<String, VarValue>,
    /// 故事是否结束
    #[serde(default)]
    pub is_end: bool,
    /// 故事级标签（只在开局时应用）
    #[serde(default)]
    pub global_tags: Vec<Tag>,
}

impl StoryFrame {
    /// 选项中是否存在指定索引
    pub fn has_choice(&self, index: usize) -> bool {
        self.choices.iter().any(|c| c.index == index)
    }

    /// 所有可用的选项索引
    pub fn choice_indices(&self) -> Vec<usize> {
        self.choices.iter().map(|c| c.index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_speaker_and_len() {
        let p = Paragraph::with_tags("Привет, детектив", ["speaker:gromov", "mood:tense"]);
        assert_eq!(p.speaker(), Some("gromov"));
        // 按字符计数，而不是字节
        assert_eq!(p.char_len(), 16);
        assert_eq!(Paragraph::new("").char_len(), 0);
    }

    #[test]
    fn test_interrogation_choice() {
        assert!(Choice::new(0, "Давить").tagged(["tactic:press"]).is_interrogation());
        assert!(Choice::new(1, "Молчать").tagged(["interrogation"]).is_interrogation());
        assert!(!Choice::new(2, "Уйти").is_interrogation());
    }

    #[test]
    fn test_frame_deserialize_defaults() {
        let json = r#"{
            "paragraphs": [{ "text": "Дождь.", "tags": ["mood:horror"] }],
            "variables": { "score": 3, "name": "Ivan", "alive": true, "ratio": 0.5 }
        }"#;
        let frame: StoryFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.paragraphs.len(), 1);
        assert!(frame.choices.is_empty());
        assert!(!frame.is_end);
        assert_eq!(frame.variables["score"], VarValue::Int(3));
        assert_eq!(frame.variables["name"], VarValue::String("Ivan".to_string()));
        assert_eq!(frame.variables["alive"], VarValue::Bool(true));
        assert_eq!(frame.variables["ratio"], VarValue::Float(0.5));
    }

    #[test]
    fn test_choice_lookup() {
        let frame = StoryFrame {
            choices: vec![Choice::new(0, "a"), Choice::new(2, "b")],
            ..Default::default()
        };
        assert!(frame.has_choice(2));
        assert!(!frame.has_choice(1));
        assert_eq!(frame.choice_indices(), vec![0, 2]);
    }
}
