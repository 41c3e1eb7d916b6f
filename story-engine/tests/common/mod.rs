//! 集成测试共用的假故事运行时。
//!
//! 行为模仿真实的分支叙事 VM：
//! - 内部游标在产出段落后即越过它们
//! - 读档后第一次 `cont()` 不再返回当前节点的段落，只返回选项

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use story_engine::{
    AdapterError, Choice, EngineConfig, Paragraph, Session, SessionStatus, StoryFrame,
    StoryRuntime, Tag, VarValue,
};

/// 故事节点
#[derive(Debug, Clone, Default)]
pub struct Node {
    paragraphs: Vec<Paragraph>,
    choices: Vec<(Choice, String)>,
    next: Option<String>,
}

impl Node {
    pub fn new(paragraphs: Vec<Paragraph>) -> Self {
        Self {
            paragraphs,
            ..Default::default()
        }
    }

    /// 追加选项
    pub fn choice(mut self, text: &str, tags: &[&str], target: &str) -> Self {
        let index = self.choices.len();
        let choice = Choice::new(index, text).tagged(tags.iter().copied());
        self.choices.push((choice, target.to_string()));
        self
    }

    /// 没有选项时点击继续进入的节点
    pub fn then(mut self, target: &str) -> Self {
        self.next = Some(target.to_string());
        self
    }
}

pub fn p(text: &str, tags: &[&str]) -> Paragraph {
    Paragraph::with_tags(text, tags.iter().copied())
}

/// 假运行时
#[derive(Debug, Clone)]
pub struct FakeStory {
    nodes: BTreeMap<String, Node>,
    start: String,
    global_tags: Vec<Tag>,
    current: String,
    /// 当前节点的段落是否已经产出
    emitted: bool,
    visits: i64,
    /// 记录所有调用，便于断言"没有调用运行时"
    pub calls: Vec<String>,
    /// 下一次 `choose` 返回错误
    pub fail_next_choose: bool,
}

impl FakeStory {
    pub fn new(start: &str) -> Self {
        Self {
            nodes: BTreeMap::new(),
            start: start.to_string(),
            global_tags: Vec::new(),
            current: start.to_string(),
            emitted: false,
            visits: 0,
            calls: Vec::new(),
            fail_next_choose: false,
        }
    }

    pub fn node(mut self, id: &str, node: Node) -> Self {
        self.nodes.insert(id.to_string(), node);
        self
    }

    pub fn global_tags(mut self, tags: &[&str]) -> Self {
        self.global_tags = Tag::parse_all(tags.iter().copied());
        self
    }

    fn current_node(&self) -> Result<&Node, AdapterError> {
        self.nodes
            .get(&self.current)
            .ok_or_else(|| AdapterError::MalformedStory(format!("缺少节点 {}", self.current)))
    }

    fn enter(&mut self, id: &str) -> Result<StoryFrame, AdapterError> {
        self.current = id.to_string();
        self.emitted = true;
        self.visits += 1;
        self.frame(true)
    }

    fn frame(&self, with_paragraphs: bool) -> Result<StoryFrame, AdapterError> {
        let node = self.current_node()?;
        let mut variables = BTreeMap::new();
        variables.insert("visits".to_string(), VarValue::Int(self.visits));
        variables.insert("node".to_string(), VarValue::String(self.current.clone()));

        Ok(StoryFrame {
            paragraphs: if with_paragraphs {
                node.paragraphs.clone()
            } else {
                Vec::new()
            },
            choices: node.choices.iter().map(|(c, _)| c.clone()).collect(),
            variables,
            is_end: node.choices.is_empty() && node.next.is_none(),
            global_tags: self.global_tags.clone(),
        })
    }
}

impl StoryRuntime for FakeStory {
    fn reset(&mut self) -> Result<StoryFrame, AdapterError> {
        self.calls.push("reset".to_string());
        self.visits = 0;
        let start = self.start.clone();
        self.enter(&start)
    }

    fn cont(&mut self) -> Result<StoryFrame, AdapterError> {
        self.calls.push("cont".to_string());
        if !self.emitted {
            self.emitted = true;
            return self.frame(true);
        }
        match self.current_node()?.next.clone() {
            Some(next) => self.enter(&next),
            None => self.frame(false),
        }
    }

    fn choose(&mut self, index: usize) -> Result<StoryFrame, AdapterError> {
        self.calls.push(format!("choose {index}"));
        if self.fail_next_choose {
            self.fail_next_choose = false;
            return Err(AdapterError::MalformedStory("分支目标丢失".to_string()));
        }
        let node = self.current_node()?;
        let target = node
            .choices
            .iter()
            .find(|(c, _)| c.index == index)
            .map(|(_, target)| target.clone())
            .ok_or_else(|| AdapterError::InvalidChoice {
                index,
                available: node.choices.iter().map(|(c, _)| c.index).collect(),
            })?;
        self.enter(&target)
    }

    fn serialize_state(&self) -> Result<String, AdapterError> {
        Ok(format!("node={};visits={}", self.current, self.visits))
    }

    fn load_state(&mut self, state: &str) -> Result<(), AdapterError> {
        let invalid = || AdapterError::InvalidState(state.to_string());
        let (node, visits) = state.split_once(';').ok_or_else(invalid)?;
        let node = node.strip_prefix("node=").ok_or_else(invalid)?;
        let visits = visits
            .strip_prefix("visits=")
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)?;
        if !self.nodes.contains_key(node) {
            return Err(invalid());
        }
        self.current = node.to_string();
        self.visits = visits;
        self.emitted = true;
        Ok(())
    }
}

/// 侦探小故事
///
/// ```text
/// intro ──Допросить──► interview ──(任一战术)──► confess ──tap──► epilogue (end)
///   └────Уйти────────► leave (end)
/// ```
pub fn detective_story() -> FakeStory {
    FakeStory::new("intro")
        .global_tags(&["author:test", "mood:mystery"])
        .node(
            "intro",
            Node::new(vec![
                p("Ночь. Дождь.", &["mood:tense", "title:Туман", "image:street"]),
                p("Где вы были вчера?", &["speaker:gromov"]),
            ])
            .choice("Допросить", &[], "interview")
            .choice("Уйти", &[], "leave"),
        )
        .node(
            "interview",
            Node::new(vec![
                p(
                    "Комната допроса.",
                    &[
                        "mode:interrogation",
                        "suspect:gromov",
                        "suspect_name:Громов",
                        "timer:120",
                        "mood:pressure",
                    ],
                ),
                p("Я ничего не знаю.", &["speaker:gromov", "pressure:+30"]),
            ])
            .choice("Показать фото", &["tactic:evidence"], "confess")
            .choice("Надавить", &["interrogation"], "confess"),
        )
        .node(
            "confess",
            Node::new(vec![p(
                "Ладно. Это был я.",
                &["speaker:gromov", "end_interrogation", "clue"],
            )])
            .then("epilogue"),
        )
        .node(
            "epilogue",
            Node::new(vec![p("Дело закрыто.", &["chapter:2", "title:Эпилог"])]),
        )
        .node("leave", Node::new(vec![p("Вы ушли.", &[])]))
}

/// 按节奏示例构造的故事：三段旁白，长度 10 / 50 / 150
pub fn pacing_story() -> FakeStory {
    FakeStory::new("pacing")
        .node(
            "pacing",
            Node::new(vec![
                p(&"a".repeat(10), &[]),
                p(&"b".repeat(50), &[]),
                p(&"c".repeat(150), &[]),
            ])
            .choice("Дальше", &[], "pacing"),
        )
}

pub fn new_session(story: FakeStory) -> Session<FakeStory> {
    Session::new(story, EngineConfig::default())
}

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// 按 `next_wakeup` 推进，直到本帧揭示完成
pub fn settle(session: &mut Session<FakeStory>) {
    for _ in 0..64 {
        if session.status() != SessionStatus::Revealing {
            return;
        }
        let step = session.next_wakeup().unwrap_or(ms(100));
        session.tick(step);
    }
    panic!("揭示没有在预期步数内完成");
}
