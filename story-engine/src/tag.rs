//! # Tag 模块
//!
//! 段落标签：挂在单个段落上的旁路信号。
//!
//! ## 语法
//!
//! ```text
//! clue              -> Tag::Flag("clue")
//! mood:horror       -> Tag::Pair { key: "mood", value: "horror" }
//! title:Act: One    -> Tag::Pair { key: "title", value: "Act: One" }   // 只按第一个 ':' 切分
//! ```
//!
//! 值一律是未定类型的字符串，由消费方自行解释。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 段落标签
///
/// 序列化为原始字符串形式（`"mood:horror"`），存档里的段落缓存与外部 VM 输出保持同一格式。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tag {
    /// 仅表示存在的标记
    Flag(String),
    /// `key:value` 键值对
    Pair { key: String, value: String },
}

/// 转发给观察者的标签值
///
/// 对应外部接口里的 `(key, value | true)`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagValue {
    /// 键值对的值
    Text(String),
    /// 裸标记
    Present,
}

impl Tag {
    /// 解析单个标签
    ///
    /// 首尾空白会被去掉；键为空时（如 `":x"`）整体视为裸标记。
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => Self::Pair {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            },
            _ => Self::Flag(raw.to_string()),
        }
    }

    /// 批量解析
    pub fn parse_all<I, S>(raws: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raws.into_iter().map(|s| Self::parse(s.as_ref())).collect()
    }

    /// 创建键值对标签
    pub fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Pair {
            key: key.into(),
            value: value.into(),
        }
    }

    /// 创建裸标记
    pub fn flag(name: impl Into<String>) -> Self {
        Self::Flag(name.into())
    }

    /// 标签键（裸标记返回其名称）
    pub fn key(&self) -> &str {
        match self {
            Self::Flag(name) => name,
            Self::Pair { key, .. } => key,
        }
    }

    /// 标签值（裸标记没有值）
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Flag(_) => None,
            Self::Pair { value, .. } => Some(value),
        }
    }

    /// 是否为指定名称的裸标记
    pub fn is_flag(&self, name: &str) -> bool {
        matches!(self, Self::Flag(n) if n == name)
    }

    /// 转发给观察者时使用的值
    pub fn observed_value(&self) -> TagValue {
        match self {
            Self::Flag(_) => TagValue::Present,
            Self::Pair { value, .. } => TagValue::Text(value.clone()),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(name) => write!(f, "{}", name),
            Self::Pair { key, value } => write!(f, "{}:{}", key, value),
        }
    }
}

impl From<String> for Tag {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for Tag {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.to_string()
    }
}

/// 在一组标签中查找第一个匹配键的值
pub fn value_of<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter().find_map(|t| match t {
        Tag::Pair { key: k, value } if k == key => Some(value.as_str()),
        _ => None,
    })
}

/// 一组标签中是否含有指定裸标记
pub fn has_flag(tags: &[Tag], name: &str) -> bool {
    tags.iter().any(|t| t.is_flag(name))
}
