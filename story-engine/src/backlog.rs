//! # Backlog 模块
//!
//! 回看记录：已揭示的段落、做出的选择、章节标记。
//!
//! - 只记录真正展示给玩家的内容（揭示或跳过后出现的段落）
//! - 时间戳取自会话内的故事时钟，而不是真实时间
//! - 有容量上限，超出时丢弃最早的记录

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::clock::StoryClock;

/// 回看条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BacklogEntry {
    /// 段落
    Paragraph {
        /// 说话者（None 表示旁白）
        speaker: Option<String>,
        text: String,
        at: StoryClock,
    },

    /// 选择
    ChoiceMade {
        /// 当时可选的全部选项文本
        options: Vec<String>,
        /// 选中的选项索引（运行时索引）
        selected_index: usize,
        at: StoryClock,
    },

    /// 章节标记
    ChapterMark { chapter: u32, title: String, at: StoryClock },
}

impl BacklogEntry {
    /// 条目的故事时间
    pub fn at(&self) -> StoryClock {
        match self {
            BacklogEntry::Paragraph { at, .. } => *at,
            BacklogEntry::ChoiceMade { at, .. } => *at,
            BacklogEntry::ChapterMark { at, .. } => *at,
        }
    }
}

/// 回看记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backlog {
    entries: VecDeque<BacklogEntry>,
    capacity: usize,
}

impl Default for Backlog {
    fn default() -> Self {
        Self::with_capacity(500)
    }
}

impl Backlog {
    /// 创建指定容量的记录（容量至少为 1）
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// 追加条目
    pub fn push(&mut self, entry: BacklogEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// 按时间顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &BacklogEntry> {
        self.entries.iter()
    }

    /// 最近的 N 条段落
    pub fn recent_paragraphs(&self, count: usize) -> Vec<&BacklogEntry> {
        let mut recent: Vec<_> = self
            .entries
            .iter()
            .rev()
            .filter(|e| matches!(e, BacklogEntry::Paragraph { .. }))
            .take(count)
            .collect();
        recent.reverse();
        recent
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
