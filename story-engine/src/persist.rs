//! # Persist 模块
//!
//! 会话快照与恢复。
//!
//! ## 为什么需要段落缓存
//!
//! 外部 VM 的内部游标在存档时已经越过了当前帧的段落，
//! 读档后第一次 `cont()` 往往返回零个段落。快照因此在不透明的 VM 状态旁边
//! 额外保存当前帧的全部段落，分成"已展示"与"尚未展示"两段：
//!
//! ```text
//! load_state(runtime_state) ─► cont() ─┬─ paragraphs 为空 ──► 已展示 + 未展示，从断点继续揭示
//!                                      └─ paragraphs 非空 ──► 以实时段落为准
//! choices / variables 总是取实时值
//! ```
//!
//! 帧切换后立即自动存档时已展示段落为空，整帧都在"尚未展示"里。
//!
//! ## 版本
//!
//! - MAJOR：不兼容的格式变更
//! - MINOR：向后兼容的新字段（新字段一律 `#[serde(default)]`）

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::adapter::StoryRuntime;
use crate::error::{EngineResult, PersistError};
use crate::frame::{Paragraph, StoryFrame};
use crate::presentation::PresentationState;

/// 快照格式版本
pub const SNAPSHOT_VERSION_MAJOR: u32 = 1;
pub const SNAPSHOT_VERSION_MINOR: u32 = 1;

/// 快照版本信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVersion {
    pub major: u32,
    pub minor: u32,
}

impl SnapshotVersion {
    /// 当前版本
    pub fn current() -> Self {
        Self {
            major: SNAPSHOT_VERSION_MAJOR,
            minor: SNAPSHOT_VERSION_MINOR,
        }
    }

    /// major 相同即兼容
    pub fn is_compatible(&self) -> bool {
        self.major == SNAPSHOT_VERSION_MAJOR
    }
}

impl Default for SnapshotVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// 会话快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// 格式版本
    #[serde(default)]
    pub version: SnapshotVersion,
    /// 外部 VM 的不透明状态
    pub runtime_state: String,
    /// 存档时已展示的段落
    #[serde(default)]
    pub materialized_paragraphs: Vec<Paragraph>,
    /// 当前帧中尚未展示的段落（1.1 起）
    #[serde(default)]
    pub pending_paragraphs: Vec<Paragraph>,
    /// 展示状态（情绪、章节、审讯等）
    ///
    /// 当前帧的段落未必带有这些标签，只靠段落缓存无法还原。
    #[serde(default)]
    pub presentation: Option<PresentationState>,
}

impl SessionSnapshot {
    /// 创建快照
    pub fn new(runtime_state: impl Into<String>, materialized_paragraphs: Vec<Paragraph>) -> Self {
        Self {
            version: SnapshotVersion::current(),
            runtime_state: runtime_state.into(),
            materialized_paragraphs,
            pending_paragraphs: Vec::new(),
            presentation: None,
        }
    }

    /// 附加当前帧尚未展示的段落
    pub fn with_pending(mut self, pending: Vec<Paragraph>) -> Self {
        self.pending_paragraphs = pending;
        self
    }

    /// 附加展示状态
    pub fn with_presentation(mut self, presentation: PresentationState) -> Self {
        self.presentation = Some(presentation);
        self
    }

    /// 检查版本兼容性
    pub fn check_version(&self) -> Result<(), PersistError> {
        if self.version.is_compatible() {
            Ok(())
        } else {
            Err(PersistError::IncompatibleVersion {
                save_version: self.version.to_string(),
                current_version: SnapshotVersion::current().to_string(),
            })
        }
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String, PersistError> {
        serde_json::to_string_pretty(self).map_err(|e| PersistError::SerializationFailed(e.to_string()))
    }

    /// 从 JSON 字符串反序列化（含版本检查）
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        let snapshot: SessionSnapshot =
            serde_json::from_str(json).map_err(|e| PersistError::DeserializationFailed(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }
}

/// 恢复得到的帧
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredFrame {
    pub frame: StoryFrame,
    /// 段落是否来自快照缓存
    pub from_cache: bool,
    /// 恢复时已展示的段落数；实时段落为 0
    pub revealed: usize,
}

/// 载入快照并取回当前帧
///
/// - 快照版本不兼容 → [`PersistError::IncompatibleVersion`]
/// - VM 拒绝 `runtime_state` → [`PersistError::CorruptRuntimeState`]，不做任何降级
/// - 之后的 `cont()` 失败 → 原样传递运行时错误
pub fn restore_frame<R: StoryRuntime + ?Sized>(
    runtime: &mut R,
    snapshot: &SessionSnapshot,
) -> EngineResult<RestoredFrame> {
    snapshot.check_version()?;

    runtime
        .load_state(&snapshot.runtime_state)
        .map_err(|e| PersistError::CorruptRuntimeState(e.to_string()))?;

    let mut frame = runtime.cont()?;
    let cached = snapshot.materialized_paragraphs.len() + snapshot.pending_paragraphs.len();
    if !frame.paragraphs.is_empty() || cached == 0 {
        return Ok(RestoredFrame {
            frame,
            from_cache: false,
            revealed: 0,
        });
    }

    debug!(
        revealed = snapshot.materialized_paragraphs.len(),
        pending = snapshot.pending_paragraphs.len(),
        "运行时未返回段落，使用快照缓存"
    );
    frame.paragraphs = snapshot
        .materialized_paragraphs
        .iter()
        .chain(&snapshot.pending_paragraphs)
        .cloned()
        .collect();

    Ok(RestoredFrame {
        frame,
        from_cache: true,
        revealed: snapshot.materialized_paragraphs.len(),
    })
}

/// 快照存储
///
/// 不透明的键值存储；键由宿主决定（如存档槽位）。
pub trait SnapshotStore {
    /// 写入快照（覆盖同名键）
    fn put(&mut self, key: &str, snapshot: &SessionSnapshot) -> Result<(), PersistError>;

    /// 读取快照，不存在时返回 `None`
    fn get(&self, key: &str) -> Result<Option<SessionSnapshot>, PersistError>;

    /// 删除快照，不存在时为无操作
    fn delete(&mut self, key: &str) -> Result<(), PersistError>;
}

/// 内存存储
///
/// 以 JSON 文本保存，读写路径与文件存储一致（包括版本检查）。
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存的键
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// 直接写入原始文本（用于模拟损坏或旧版本的存档）
    pub fn put_raw(&mut self, key: &str, json: impl Into<String>) {
        self.entries.insert(key.to_string(), json.into());
    }
}

impl SnapshotStore for MemoryStore {
    fn put(&mut self, key: &str, snapshot: &SessionSnapshot) -> Result<(), PersistError> {
        let json = snapshot.to_json()?;
        self.entries.insert(key.to_string(), json);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<SessionSnapshot>, PersistError> {
        self.entries
            .get(key)
            .map(|json| SessionSnapshot::from_json(json))
            .transpose()
    }

    fn delete(&mut self, key: &str) -> Result<(), PersistError> {
        if self.entries.remove(key).is_none() {
            warn!(key = %key, "删除不存在的快照");
        }
        Ok(())
    }
}
