//! # Error 模块
//!
//! 定义 story-engine 中使用的错误类型。
//!
//! 标签解析中的异常（未知标签、格式错误的数字）**不是**错误，
//! 它们会被静默降级处理，不会出现在这里。

use thiserror::Error;

/// 故事运行时（外部 VM）错误
///
/// 由 [`StoryRuntime`](crate::adapter::StoryRuntime) 的实现返回，引擎原样向上传递，不做重试。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    /// 无效的选择索引
    #[error("无效的选择索引 {index}，可用索引: {available:?}")]
    InvalidChoice { index: usize, available: Vec<usize> },

    /// 故事数据损坏
    #[error("故事数据格式错误: {0}")]
    MalformedStory(String),

    /// 无法解析的运行时状态
    #[error("运行时状态无法解析: {0}")]
    InvalidState(String),

    /// 故事已结束
    #[error("故事已经结束")]
    StoryEnded,
}

/// 存档错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistError {
    /// 序列化失败
    #[error("序列化失败: {0}")]
    SerializationFailed(String),

    /// 反序列化失败
    #[error("反序列化失败: {0}")]
    DeserializationFailed(String),

    /// 版本不兼容
    #[error("存档版本不兼容: 存档版本 {save_version} vs 当前版本 {current_version}")]
    IncompatibleVersion {
        save_version: String,
        current_version: String,
    },

    /// 快照中的运行时状态被外部 VM 拒绝
    #[error("存档中的运行时状态已损坏: {0}")]
    CorruptRuntimeState(String),

    /// 存储读写失败
    #[error("存储操作失败: {0}")]
    Storage(String),
}

/// 引擎统一错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// 外部运行时错误
    #[error("故事运行时错误: {0}")]
    Adapter(#[from] AdapterError),

    /// 存档错误
    #[error("存档错误: {0}")]
    Persist(#[from] PersistError),

    /// 会话已关闭
    #[error("会话已关闭")]
    SessionClosed,
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
