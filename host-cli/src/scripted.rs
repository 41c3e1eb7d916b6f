//! # Scripted 模块
//!
//! 基于 JSON 节点图的简易故事运行时，用于在没有真实 VM 时试玩和调试。
//!
//! ## 文件格式
//!
//! ```json
//! {
//!   "start": "intro",
//!   "global_tags": ["mood:mystery"],
//!   "nodes": {
//!     "intro": {
//!       "paragraphs": [{ "text": "...", "tags": ["speaker:gromov"] }],
//!       "choices": [{ "text": "...", "goto": "interview", "tags": ["tactic:press"] }],
//!       "set": { "met_gromov": true }
//!     },
//!     "interview": { "paragraphs": [...], "next": "epilogue" }
//!   }
//! }
//! ```
//!
//! - 没有 `choices` 也没有 `next` 的节点即为结局
//! - 内部游标在产出段落后即越过它们：读档后第一次 `cont()` 只返回选项

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use story_engine::{AdapterError, Choice, Paragraph, StoryFrame, StoryRuntime, Tag, VarValue};
use tracing::debug;

/// 故事文件
#[derive(Debug, Clone, Deserialize)]
pub struct StoryScript {
    pub start: String,
    #[serde(default)]
    pub global_tags: Vec<Tag>,
    /// 初始变量
    #[serde(default)]
    pub variables: BTreeMap<String, VarValue>,
    pub nodes: BTreeMap<String, ScriptNode>,
}

/// 故事节点
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptNode {
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default)]
    pub choices: Vec<ScriptChoice>,
    /// 点击继续时进入的节点
    #[serde(default)]
    pub next: Option<String>,
    /// 进入节点时写入的变量
    #[serde(default)]
    pub set: BTreeMap<String, VarValue>,
}

/// 节点上的选项
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptChoice {
    pub text: String,
    pub goto: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// 运行时的可序列化状态
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScriptState {
    node: String,
    /// 当前节点的段落是否已经产出
    emitted: bool,
    variables: BTreeMap<String, VarValue>,
}

/// JSON 节点图运行时
#[derive(Debug, Clone)]
pub struct ScriptedRuntime {
    script: StoryScript,
    state: ScriptState,
}

impl ScriptedRuntime {
    /// 解析并校验故事文件
    pub fn from_json(json: &str) -> Result<Self, AdapterError> {
        let script: StoryScript =
            serde_json::from_str(json).map_err(|e| AdapterError::MalformedStory(e.to_string()))?;
        Self::new(script)
    }

    /// 校验节点引用后创建运行时
    pub fn new(script: StoryScript) -> Result<Self, AdapterError> {
        let missing = |target: &str| !script.nodes.contains_key(target);

        if missing(&script.start) {
            return Err(AdapterError::MalformedStory(format!(
                "起始节点不存在: {}",
                script.start
            )));
        }
        for (id, node) in &script.nodes {
            let targets = node
                .choices
                .iter()
                .map(|c| c.goto.as_str())
                .chain(node.next.as_deref());
            for target in targets {
                if missing(target) {
                    return Err(AdapterError::MalformedStory(format!(
                        "节点 {id} 引用了不存在的节点 {target}"
                    )));
                }
            }
        }

        let state = ScriptState {
            node: script.start.clone(),
            emitted: false,
            variables: script.variables.clone(),
        };
        Ok(Self { script, state })
    }

    /// 当前节点 ID
    pub fn current_node(&self) -> &str {
        &self.state.node
    }

    fn node(&self) -> Result<&ScriptNode, AdapterError> {
        self.script
            .nodes
            .get(&self.state.node)
            .ok_or_else(|| AdapterError::InvalidState(format!("节点不存在: {}", self.state.node)))
    }

    fn enter(&mut self, id: &str) -> Result<StoryFrame, AdapterError> {
        debug!(node = %id, "进入节点");
        self.state.node = id.to_string();
        self.state.emitted = true;
        let assignments = self.node()?.set.clone();
        self.state.variables.extend(assignments);
        self.frame(true)
    }

    fn frame(&self, with_paragraphs: bool) -> Result<StoryFrame, AdapterError> {
        let node = self.node()?;
        let choices = node
            .choices
            .iter()
            .enumerate()
            .map(|(index, c)| Choice {
                index,
                text: c.text.clone(),
                tags: c.tags.clone(),
            })
            .collect();

        Ok(StoryFrame {
            paragraphs: if with_paragraphs {
                node.paragraphs.clone()
            } else {
                Vec::new()
            },
            choices,
            variables: self.state.variables.clone(),
            is_end: node.choices.is_empty() && node.next.is_none(),
            global_tags: self.script.global_tags.clone(),
        })
    }
}

impl StoryRuntime for ScriptedRuntime {
    fn reset(&mut self) -> Result<StoryFrame, AdapterError> {
        self.state.variables = self.script.variables.clone();
        let start = self.script.start.clone();
        self.enter(&start)
    }

    fn cont(&mut self) -> Result<StoryFrame, AdapterError> {
        if !self.state.emitted {
            self.state.emitted = true;
            return self.frame(true);
        }
        match self.node()?.next.clone() {
            Some(next) => self.enter(&next),
            None => self.frame(false),
        }
    }

    fn choose(&mut self, index: usize) -> Result<StoryFrame, AdapterError> {
        let node = self.node()?;
        let Some(choice) = node.choices.get(index) else {
            return Err(AdapterError::InvalidChoice {
                index,
                available: (0..node.choices.len()).collect(),
            });
        };
        let target = choice.goto.clone();
        self.enter(&target)
    }

    fn serialize_state(&self) -> Result<String, AdapterError> {
        serde_json::to_string(&self.state).map_err(|e| AdapterError::InvalidState(e.to_string()))
    }

    fn load_state(&mut self, state: &str) -> Result<(), AdapterError> {
        let loaded: ScriptState =
            serde_json::from_str(state).map_err(|e| AdapterError::InvalidState(e.to_string()))?;
        if !self.script.nodes.contains_key(&loaded.node) {
            return Err(AdapterError::InvalidState(format!(
                "节点不存在: {}",
                loaded.node
            )));
        }
        self.state = loaded;
        Ok(())
    }
}
