//! # Adapter 模块
//!
//! 外部故事运行时（编译后的分支叙事 VM）的契约。
//!
//! 引擎只通过这个 trait 与 VM 交互，不关心脚本语言、分支求值和变量计算。
//!
//! ```text
//! Session                         StoryRuntime
//!   │──── reset() / choose(i) ───────►│
//!   │◄─────────── StoryFrame ─────────│
//!   │──── serialize_state() ─────────►│  -> String（不透明）
//!   │──── load_state(s) + cont() ────►│  -> StoryFrame（可能没有段落）
//! ```

use crate::error::AdapterError;
use crate::frame::StoryFrame;

/// 故事运行时适配器
///
/// # 契约
///
/// - 对同一内部状态，`StoryFrame.paragraphs` 的顺序稳定
/// - `choose` 只在上一帧的 `choices` 含有该索引时合法
/// - `load_state` 之后调用 `cont`，运行时可能返回零个段落
///   （其内部游标在存档时已经越过了这些内容）
pub trait StoryRuntime {
    /// 从头开始
    fn reset(&mut self) -> Result<StoryFrame, AdapterError>;

    /// 从当前内部状态继续（读档后使用）
    fn cont(&mut self) -> Result<StoryFrame, AdapterError>;

    /// 选择一个选项并推进
    fn choose(&mut self, index: usize) -> Result<StoryFrame, AdapterError>;

    /// 导出不透明的内部状态
    fn serialize_state(&self) -> Result<String, AdapterError>;

    /// 载入不透明的内部状态
    fn load_state(&mut self, state: &str) -> Result<(), AdapterError>;
}

impl<R: StoryRuntime + ?Sized> StoryRuntime for Box<R> {
    fn reset(&mut self) -> Result<StoryFrame, AdapterError> {
        (**self).reset()
    }

    fn cont(&mut self) -> Result<StoryFrame, AdapterError> {
        (**self).cont()
    }

    fn choose(&mut self, index: usize) -> Result<StoryFrame, AdapterError> {
        (**self).choose(index)
    }

    fn serialize_state(&self) -> Result<String, AdapterError> {
        (**self).serialize_state()
    }

    fn load_state(&mut self, state: &str) -> Result<(), AdapterError> {
        (**self).load_state(state)
    }
}
